use std::sync::Mutex;

use crate::chunk::ChunkWriter;
use crate::error::RtmpError;
use crate::message::RtmpMessage;
use crate::transport::RtmpWriteHalf;

/// The single mutual-exclusion point all outbound messages cross (§4.2,
/// §5). Commands, control messages, keep-alive pings and media all share
/// this lane; whichever caller currently holds the lock fully serializes a
/// message onto the wire before anyone else's chunks can interleave.
pub struct WriterLane {
    writer: Mutex<ChunkWriter<RtmpWriteHalf>>,
}

impl WriterLane {
    pub fn new(stream: RtmpWriteHalf) -> Self {
        Self {
            writer: Mutex::new(ChunkWriter::new(stream)),
        }
    }

    pub fn send(&self, msg: &RtmpMessage) -> Result<(), RtmpError> {
        let mut writer = self.writer.lock().expect("writer lane mutex poisoned");
        writer.write_message(msg)?;
        Ok(())
    }

    /// Changes the outbound chunk size. Safe to call at any time because
    /// `write_message` always completes a whole message before returning
    /// the lock, so no message is ever split across two chunk sizes.
    pub fn set_chunk_size(&self, size: usize) {
        let mut writer = self.writer.lock().expect("writer lane mutex poisoned");
        writer.set_chunk_size(size);
    }

    pub fn chunk_size(&self) -> usize {
        self.writer.lock().expect("writer lane mutex poisoned").chunk_size()
    }
}
