use std::io::{self, Write};

use crate::{
    chunk::{ChunkFmt, DEFAULT_CHUNK_SIZE, EXTENDED_TIMESTAMP_MARKER},
    message::RtmpMessage,
};

/// Serializes whole `RtmpMessage`s into chunk sequences on an underlying
/// stream. Every new message is written as a format-0 (full header) chunk
/// followed by format-3 continuation chunks once the payload exceeds
/// `chunk_size` — see §9: the teacher never delta-encodes subsequent
/// headers, which is correct but leaves compression on the table; this
/// spec keeps that behavior since no compatibility data justifies a
/// narrower header on the wire.
///
/// Callers must serialize calls to [`ChunkWriter::write_message`]
/// themselves (e.g. behind a mutex) — a single in-flight write assumes
/// exclusive access to the underlying stream so interleaved chunks from
/// different message-type pumps never corrupt each other.
pub struct ChunkWriter<W> {
    stream: W,
    chunk_size: usize,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(stream: W) -> Self {
        Self {
            stream,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Changes the outbound chunk size. Only safe to call between messages:
    /// `write_message` always completes a whole message before returning,
    /// so calling this right after a `write_message` call never splits a
    /// message across two chunk sizes.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size;
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn write_message(&mut self, msg: &RtmpMessage) -> io::Result<()> {
        let total_len = msg.payload.len();
        let extended = msg.timestamp >= EXTENDED_TIMESTAMP_MARKER;
        let header_timestamp = if extended {
            EXTENDED_TIMESTAMP_MARKER
        } else {
            msg.timestamp
        };

        let mut offset = 0usize;
        while offset < total_len || (total_len == 0 && offset == 0) {
            let chunk_len = (total_len - offset).min(self.chunk_size);

            if offset == 0 {
                self.write_basic_header(ChunkFmt::Full, msg.chunk_stream_id)?;
                self.write_u24(header_timestamp)?;
                self.write_u24(total_len as u32)?;
                self.stream.write_all(&[msg.message_type.into_id()])?;
                self.write_u32_le(msg.message_stream_id)?;
            } else {
                self.write_basic_header(ChunkFmt::Continuation, msg.chunk_stream_id)?;
            }
            if extended {
                self.write_u32_be(msg.timestamp)?;
            }

            self.stream
                .write_all(&msg.payload[offset..offset + chunk_len])?;
            offset += chunk_len;

            if total_len == 0 {
                break;
            }
        }

        self.stream.flush()
    }

    fn write_basic_header(&mut self, fmt: ChunkFmt, csid: u32) -> io::Result<()> {
        let fmt_bits = fmt.into_bits() << 6;
        if csid >= 2 && csid <= 63 {
            self.stream.write_all(&[fmt_bits | csid as u8])?;
        } else if csid <= 319 {
            self.stream.write_all(&[fmt_bits, (csid - 64) as u8])?;
        } else {
            let rel = csid - 64;
            self.stream.write_all(&[fmt_bits | 0x01])?;
            self.stream.write_all(&(rel as u16).to_le_bytes())?;
        }
        Ok(())
    }

    fn write_u24(&mut self, value: u32) -> io::Result<()> {
        self.stream.write_all(&value.to_be_bytes()[1..4])
    }

    fn write_u32_be(&mut self, value: u32) -> io::Result<()> {
        self.stream.write_all(&value.to_be_bytes())
    }

    fn write_u32_le(&mut self, value: u32) -> io::Result<()> {
        self.stream.write_all(&value.to_le_bytes())
    }
}
