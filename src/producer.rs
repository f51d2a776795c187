//! External encoder producer interface (§6). Treated as an opaque
//! collaborator: the crate never touches capture or encoding, only
//! consumes whatever timestamped encoded frames + one codec-config blob the
//! producer yields.

use std::time::Duration;

use crate::error::RtmpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Video,
    Audio,
}

/// One unit handed from an encoder to the Media Pump.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub track: Track,
    pub is_codec_config: bool,
    pub is_keyframe: bool,
    pub data: Vec<u8>,
    pub presentation_ts_us: u64,
}

/// Blocking, timeout-bounded pull interface. `recv_timeout` returning `Ok(None)`
/// means "no frame yet, try again"; the Media Pump's stall watchdog is the one
/// that decides when silence becomes `EncoderStalled`, not the producer.
pub trait FrameProducer: Send {
    fn recv_timeout(&mut self, track: Track, timeout: Duration) -> Result<Option<EncodedFrame>, RtmpError>;
}
