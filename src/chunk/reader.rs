use std::{
    collections::HashMap,
    io::{self, Read},
};

use bytes::BytesMut;

use crate::{
    chunk::{ChunkFmt, DEFAULT_CHUNK_SIZE, EXTENDED_TIMESTAMP_MARKER, MAX_MESSAGE_SIZE},
    error::RtmpError,
    message::{MessageType, RtmpMessage},
};

/// Per-channel (per chunk-stream-id) assembly state, carried across chunks
/// so format 1/2/3 headers can inherit whatever the last format-0/1/2
/// header established.
#[derive(Debug, Default)]
struct ChannelState {
    timestamp: u32,
    timestamp_delta: u32,
    message_length: u32,
    message_type_id: u8,
    message_stream_id: u32,
    uses_extended_timestamp: bool,

    buffer: BytesMut,
    remaining: u32,
}

/// Parses inbound bytes into whole [`RtmpMessage`]s, maintaining the
/// per-channel header and payload-assembly state described in §3
/// (`ChunkChannelState`). Multiple channels may be assembling messages in
/// parallel; that's the point of keying state by chunk stream id.
pub struct ChunkReader<R> {
    stream: R,
    channels: HashMap<u32, ChannelState>,
    chunk_size: usize,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            channels: HashMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Applied *after* the `SetChunkSize` control message that requested it
    /// has been fully consumed — the caller is expected to call this once
    /// it has read and handled that message, never mid-message.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size;
    }

    /// Exposes the underlying stream so callers can adjust transport-level
    /// settings (e.g. read timeouts) without the reader knowing about them.
    pub fn get_ref(&self) -> &R {
        &self.stream
    }

    /// Reads and assembles chunks until one complete message is available.
    pub fn read_message(&mut self) -> Result<RtmpMessage, RtmpError> {
        loop {
            let (csid, fmt) = self.read_basic_header()?;
            let starts_new_message = self.read_chunk(csid, fmt)?;
            if let Some(msg) = starts_new_message {
                return Ok(msg);
            }
        }
    }

    fn read_basic_header(&mut self) -> Result<(u32, ChunkFmt), RtmpError> {
        let first = self.read_u8()?;
        let fmt = ChunkFmt::from_bits((first & 0b1100_0000) >> 6);
        let marker = first & 0b0011_1111;
        let csid = match marker {
            0 => self.read_u8()? as u32 + 64,
            1 => {
                let mut buf = [0u8; 2];
                self.stream.read_exact(&mut buf)?;
                u16::from_le_bytes(buf) as u32 + 64
            }
            n => n as u32,
        };
        Ok((csid, fmt))
    }

    /// Reads one chunk's message header + payload slice for `csid`,
    /// returning `Some(message)` if this chunk completed message assembly.
    fn read_chunk(&mut self, csid: u32, fmt: ChunkFmt) -> Result<Option<RtmpMessage>, RtmpError> {
        // Read the fmt-specific header fields up front so we don't hold a
        // mutable borrow of `self.channels` across `self.read_u8`/etc calls.
        let header = match fmt {
            ChunkFmt::Full => {
                let timestamp = self.read_u24()?;
                let message_length = self.read_u24()?;
                let message_type_id = self.read_u8()?;
                let message_stream_id = self.read_u32_le()?;
                ReadHeader::Full {
                    timestamp,
                    message_length,
                    message_type_id,
                    message_stream_id,
                }
            }
            ChunkFmt::SameStream => {
                let timestamp_delta = self.read_u24()?;
                let message_length = self.read_u24()?;
                let message_type_id = self.read_u8()?;
                ReadHeader::SameStream {
                    timestamp_delta,
                    message_length,
                    message_type_id,
                }
            }
            ChunkFmt::TimestampOnly => ReadHeader::TimestampOnly {
                timestamp_delta: self.read_u24()?,
            },
            ChunkFmt::Continuation => ReadHeader::Continuation,
        };

        let is_new_message = {
            let state = self.channels.entry(csid).or_default();
            state.remaining == 0
        };

        // Whether *this* chunk's header carries (or, for a continuation,
        // previously carried) an extended timestamp, which must be
        // re-read on every chunk of the message, including continuations.
        let header_marks_extended = match &header {
            ReadHeader::Full { timestamp, .. } => *timestamp == EXTENDED_TIMESTAMP_MARKER,
            ReadHeader::SameStream { timestamp_delta, .. }
            | ReadHeader::TimestampOnly { timestamp_delta } => {
                *timestamp_delta == EXTENDED_TIMESTAMP_MARKER
            }
            ReadHeader::Continuation => {
                self.channels.get(&csid).is_some_and(|s| s.uses_extended_timestamp)
            }
        };

        let extended_timestamp = if header_marks_extended {
            Some(self.read_u32_be()?)
        } else {
            None
        };

        let state = self.channels.entry(csid).or_default();

        match header {
            ReadHeader::Full {
                timestamp,
                message_length,
                message_type_id,
                message_stream_id,
            } => {
                let absolute = extended_timestamp.unwrap_or(timestamp);
                state.timestamp = absolute;
                state.timestamp_delta = 0;
                state.message_length = message_length;
                state.message_type_id = message_type_id;
                state.message_stream_id = message_stream_id;
                state.uses_extended_timestamp = header_marks_extended;
            }
            ReadHeader::SameStream {
                timestamp_delta,
                message_length,
                message_type_id,
            } => {
                let delta = extended_timestamp.unwrap_or(timestamp_delta);
                if is_new_message {
                    state.timestamp = state.timestamp.wrapping_add(delta);
                }
                state.timestamp_delta = delta;
                state.message_length = message_length;
                state.message_type_id = message_type_id;
                state.uses_extended_timestamp = header_marks_extended;
            }
            ReadHeader::TimestampOnly { timestamp_delta } => {
                let delta = extended_timestamp.unwrap_or(timestamp_delta);
                if is_new_message {
                    state.timestamp = state.timestamp.wrapping_add(delta);
                }
                state.timestamp_delta = delta;
                state.uses_extended_timestamp = header_marks_extended;
            }
            ReadHeader::Continuation => {
                if is_new_message {
                    state.timestamp = state.timestamp.wrapping_add(state.timestamp_delta);
                }
            }
        }

        if state.message_length > MAX_MESSAGE_SIZE {
            return Err(RtmpError::ChunkTooLarge(state.message_length, MAX_MESSAGE_SIZE));
        }

        if is_new_message {
            state.buffer = BytesMut::with_capacity(state.message_length as usize);
            state.remaining = state.message_length;
        }

        let to_read = (state.remaining as usize).min(self.chunk_size);
        let mut payload = vec![0u8; to_read];
        self.stream.read_exact(&mut payload)?;
        state.buffer.extend_from_slice(&payload);
        state.remaining -= to_read as u32;

        if state.remaining == 0 {
            let message_type = MessageType::try_from_id(state.message_type_id)?;
            let message = RtmpMessage {
                chunk_stream_id: csid,
                message_type,
                message_stream_id: state.message_stream_id,
                timestamp: state.timestamp,
                payload: std::mem::take(&mut state.buffer).freeze(),
            };
            Ok(Some(message))
        } else {
            Ok(None)
        }
    }

    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.stream.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u24(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 3];
        self.stream.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes([0, buf[0], buf[1], buf[2]]))
    }

    fn read_u32_be(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.stream.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_u32_le(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.stream.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

enum ReadHeader {
    Full {
        timestamp: u32,
        message_length: u32,
        message_type_id: u8,
        message_stream_id: u32,
    },
    SameStream {
        timestamp_delta: u32,
        message_length: u32,
        message_type_id: u8,
    },
    TimestampOnly {
        timestamp_delta: u32,
    },
    Continuation,
}
