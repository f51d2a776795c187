use thiserror::Error;

use crate::amf0::{Amf0DecodeError, Amf0EncodeError};

/// Stable, UI-facing error category. Variant-to-category mapping must stay
/// stable across versions so embedding applications can localize without
/// matching on `RtmpError` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Timeout,
    Dns,
    Auth,
    ServerReject,
    Network,
    Internal,
}

#[derive(Error, Debug)]
pub enum RtmpError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("could not resolve endpoint: {0}")]
    Dns(String),

    #[error("handshake failed: server sent version {0}, expected 3")]
    HandshakeVersionMismatch(u8),

    #[error("handshake failed: truncated {0}")]
    HandshakeTruncated(&'static str),

    #[error("amf0 decode error: {0}")]
    Amf0Decode(#[from] Amf0DecodeError),

    #[error("amf0 encode error: {0}")]
    Amf0Encode(#[from] Amf0EncodeError),

    #[error("chunk message length {0} exceeds maximum of {1}")]
    ChunkTooLarge(u32, u32),

    #[error("unknown rtmp message type id {0}")]
    UnknownMessageType(u8),

    #[error("protocol invariant violated: {0}")]
    ProtocolInvariant(String),

    #[error("command rejected: {code}: {description}")]
    CommandRejected { code: String, description: String },

    #[error("timed out waiting for NetStream.Publish.Start")]
    PublishStartTimeout,

    #[error("encoder stalled: no video frame for over 500ms after publish start")]
    EncoderStalled,

    #[error("writer/reader channel closed")]
    ChannelClosed,

    #[error("operation cancelled by caller")]
    UserCancelled,
}

impl RtmpError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RtmpError::Io(_) | RtmpError::Tls(_) | RtmpError::ChannelClosed => {
                ErrorCategory::Network
            }
            RtmpError::Dns(_) => ErrorCategory::Dns,
            RtmpError::PublishStartTimeout => ErrorCategory::Timeout,
            RtmpError::CommandRejected { code, .. } if code.contains("BadName") => {
                ErrorCategory::Auth
            }
            RtmpError::CommandRejected { .. } => ErrorCategory::ServerReject,
            RtmpError::HandshakeVersionMismatch(_)
            | RtmpError::HandshakeTruncated(_)
            | RtmpError::Amf0Decode(_)
            | RtmpError::Amf0Encode(_)
            | RtmpError::ChunkTooLarge(..)
            | RtmpError::UnknownMessageType(_)
            | RtmpError::ProtocolInvariant(_) => ErrorCategory::Internal,
            RtmpError::EncoderStalled => ErrorCategory::Internal,
            RtmpError::UserCancelled => ErrorCategory::Internal,
        }
    }

    /// Whether the Supervisor should attempt a reconnect after this error
    /// surfaces during `Publishing`/`CreatedPendingPublish`, per the
    /// propagation rules.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RtmpError::UserCancelled
                | RtmpError::ProtocolInvariant(_)
                | RtmpError::CommandRejected { .. }
        )
    }
}
