use bytes::Bytes;

use crate::error::RtmpError;

/// RTMP message type ids, as carried in the chunk message header.
/// <https://rtmp.veriskope.com/docs/spec/#54-protocol-control-messages>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    SetChunkSize,
    AbortMessage,
    Acknowledgement,
    UserControl,
    WindowAckSize,
    SetPeerBandwidth,
    Audio,
    Video,
    DataMessageAmf0,
    CommandMessageAmf0,
    AggregateMessage,
}

impl MessageType {
    pub(crate) fn try_from_id(id: u8) -> Result<Self, RtmpError> {
        match id {
            1 => Ok(Self::SetChunkSize),
            2 => Ok(Self::AbortMessage),
            3 => Ok(Self::Acknowledgement),
            4 => Ok(Self::UserControl),
            5 => Ok(Self::WindowAckSize),
            6 => Ok(Self::SetPeerBandwidth),
            8 => Ok(Self::Audio),
            9 => Ok(Self::Video),
            18 => Ok(Self::DataMessageAmf0),
            20 => Ok(Self::CommandMessageAmf0),
            22 => Ok(Self::AggregateMessage),
            other => Err(RtmpError::UnknownMessageType(other)),
        }
    }

    pub(crate) fn into_id(self) -> u8 {
        match self {
            Self::SetChunkSize => 1,
            Self::AbortMessage => 2,
            Self::Acknowledgement => 3,
            Self::UserControl => 4,
            Self::WindowAckSize => 5,
            Self::SetPeerBandwidth => 6,
            Self::Audio => 8,
            Self::Video => 9,
            Self::DataMessageAmf0 => 18,
            Self::CommandMessageAmf0 => 20,
            Self::AggregateMessage => 22,
        }
    }
}

/// A whole RTMP message, already reassembled from chunks (on read) or ready
/// to be fragmented into chunks (on write). The payload is an immutable
/// byte block once constructed.
#[derive(Debug, Clone)]
pub struct RtmpMessage {
    pub chunk_stream_id: u32,
    pub message_type: MessageType,
    pub message_stream_id: u32,
    pub timestamp: u32,
    pub payload: Bytes,
}

/// Well-known chunk stream ids used by the outbound writer, matching the
/// conventional RTMP assignment so peers can demux protocol control,
/// commands, video and audio independently.
pub mod csid {
    pub const PROTOCOL_CONTROL: u32 = 2;
    pub const COMMAND: u32 = 3;
    pub const VIDEO: u32 = 8;
    pub const AUDIO: u32 = 9;
}
