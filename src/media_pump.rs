//! Media Pump (C6): bridges encoded-frame producers to the writer lane,
//! enforcing the codec-config-before-first-frame invariant and per-track
//! timestamp monotonicity (§4.6).

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::error::RtmpError;
use crate::flv::{self, AudioChannels};
use crate::message::{csid, MessageType, RtmpMessage};
use crate::metrics::MetricsCounters;
use crate::producer::{EncodedFrame, FrameProducer, Track};
use crate::protocol::WriterLane;

/// Video frames must arrive at least this often once Publishing, or the
/// session is considered stalled (§4.6).
pub const STALL_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Default)]
struct TrackState {
    codec_config_sent: bool,
    last_ts_ms: Option<i64>,
}

pub struct MediaPump {
    writer: Arc<WriterLane>,
    stream_id: u32,
    audio_channels: AudioChannels,
    session_start_ts_us: Arc<OnceLock<u64>>,
    states: HashMap<Track, TrackState>,
    counters: Arc<MetricsCounters>,
}

impl MediaPump {
    /// `session_start_ts_us` is shared between the video and audio pumps of
    /// one session (§4.7: the epoch resets on reconnect, so a fresh
    /// `OnceLock` must be constructed per session, not per track). It's set
    /// from whichever track's first non-config frame arrives first.
    pub fn new(
        writer: Arc<WriterLane>,
        stream_id: u32,
        audio_channels: AudioChannels,
        counters: Arc<MetricsCounters>,
        session_start_ts_us: Arc<OnceLock<u64>>,
    ) -> Self {
        let mut states = HashMap::new();
        states.insert(Track::Video, TrackState::default());
        states.insert(Track::Audio, TrackState::default());
        Self {
            writer,
            stream_id,
            audio_channels,
            session_start_ts_us,
            states,
            counters,
        }
    }

    /// Drives one track to completion, pulling from `producer` until it
    /// returns an error or the caller's thread is torn down by closing the
    /// socket (which surfaces here as a write error). Intended to run on
    /// its own thread per track (§5).
    pub fn pump_track(&mut self, track: Track, producer: &mut dyn FrameProducer) -> Result<(), RtmpError> {
        let mut last_frame_at = Instant::now();
        loop {
            let frame = producer.recv_timeout(track, STALL_WATCHDOG_TIMEOUT)?;
            let Some(frame) = frame else {
                if track == Track::Video && last_frame_at.elapsed() >= STALL_WATCHDOG_TIMEOUT {
                    return Err(RtmpError::EncoderStalled);
                }
                continue;
            };
            last_frame_at = Instant::now();
            self.handle_frame(frame)?;
        }
    }

    fn handle_frame(&mut self, frame: EncodedFrame) -> Result<(), RtmpError> {
        let track = frame.track;

        if frame.is_codec_config {
            if self.states.entry(track).or_default().codec_config_sent {
                trace!(?track, "dropping duplicate codec config frame");
                return Ok(());
            }
            let payload = self.build_config_tag(track, &frame.data);
            self.states.entry(track).or_default().codec_config_sent = true;
            return self.send(track, 0, payload);
        }

        let codec_config_sent = self.states.get(&track).is_some_and(|s| s.codec_config_sent);
        if !codec_config_sent {
            warn!(?track, "dropping media frame sent before codec config");
            return Ok(());
        }

        let ts_us = frame.presentation_ts_us;
        let epoch = *self.session_start_ts_us.get_or_init(|| ts_us);
        let raw_ts_ms = (ts_us.saturating_sub(epoch) / 1000) as i64;
        let ts_ms = self.enforce_monotonic(track, raw_ts_ms);

        let payload = self.build_media_tag(track, frame.is_keyframe, &frame.data);
        self.send(track, ts_ms as u32, payload)
    }

    fn enforce_monotonic(&mut self, track: Track, ts_ms: i64) -> i64 {
        let state = self.states.entry(track).or_default();
        let adjusted = match state.last_ts_ms {
            Some(last) if ts_ms <= last => {
                warn!(?track, requested = ts_ms, last, "timestamp monotonicity violation, bumping");
                last + 1
            }
            _ => ts_ms,
        };
        state.last_ts_ms = Some(adjusted);
        adjusted
    }

    fn build_config_tag(&self, track: Track, data: &[u8]) -> bytes::Bytes {
        match track {
            Track::Video => flv::build_avc_config_tag(data),
            Track::Audio => flv::build_aac_config_tag(self.audio_channels, data),
        }
    }

    fn build_media_tag(&self, track: Track, is_keyframe: bool, data: &[u8]) -> bytes::Bytes {
        match track {
            Track::Video => flv::build_avc_nalu_tag(is_keyframe, 0, data),
            Track::Audio => flv::build_aac_frame_tag(self.audio_channels, data),
        }
    }

    fn send(&self, track: Track, timestamp: u32, payload: bytes::Bytes) -> Result<(), RtmpError> {
        let (chunk_stream_id, message_type) = match track {
            Track::Video => (csid::VIDEO, MessageType::Video),
            Track::Audio => (csid::AUDIO, MessageType::Audio),
        };
        self.counters.record_bytes(payload.len());
        if track == Track::Video {
            self.counters.record_video_frame();
        }
        let msg = RtmpMessage {
            chunk_stream_id,
            message_type,
            message_stream_id: self.stream_id,
            timestamp,
            payload,
        };
        self.writer.send(&msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RtmpWriteHalf;
    use std::io::{self, Write};
    use std::net::{TcpListener, TcpStream};

    fn loopback_writer_lane() -> Arc<WriterLane> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        std::mem::forget(server);
        Arc::new(WriterLane::new(RtmpWriteHalf::Plain(client)))
    }

    struct NoopSink;
    impl Write for NoopSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn monotonicity_violation_is_corrected_to_last_plus_one() {
        let writer = loopback_writer_lane();
        let mut pump = MediaPump::new(
            writer,
            1,
            AudioChannels::Mono,
            Arc::new(MetricsCounters::default()),
            Arc::new(OnceLock::new()),
        );
        assert_eq!(pump.enforce_monotonic(Track::Video, 0), 0);
        assert_eq!(pump.enforce_monotonic(Track::Video, 16), 16);
        assert_eq!(pump.enforce_monotonic(Track::Video, 16), 17);
        assert_eq!(pump.enforce_monotonic(Track::Video, 33), 33);
    }

    #[test]
    fn codec_config_is_sent_exactly_once_per_track() {
        let writer = loopback_writer_lane();
        let mut pump = MediaPump::new(
            writer,
            1,
            AudioChannels::Mono,
            Arc::new(MetricsCounters::default()),
            Arc::new(OnceLock::new()),
        );

        pump.handle_frame(EncodedFrame {
            track: Track::Video,
            is_codec_config: true,
            is_keyframe: false,
            data: vec![1, 2, 3],
            presentation_ts_us: 0,
        })
        .unwrap();
        assert!(pump.states.get(&Track::Video).unwrap().codec_config_sent);

        // A second config frame for the same track must be dropped silently.
        pump.handle_frame(EncodedFrame {
            track: Track::Video,
            is_codec_config: true,
            is_keyframe: false,
            data: vec![9, 9, 9],
            presentation_ts_us: 0,
        })
        .unwrap();
    }

    #[test]
    fn media_frame_before_codec_config_is_dropped() {
        let writer = loopback_writer_lane();
        let mut pump = MediaPump::new(
            writer,
            1,
            AudioChannels::Mono,
            Arc::new(MetricsCounters::default()),
            Arc::new(OnceLock::new()),
        );
        let result = pump.handle_frame(EncodedFrame {
            track: Track::Video,
            is_codec_config: false,
            is_keyframe: true,
            data: vec![1],
            presentation_ts_us: 0,
        });
        assert!(result.is_ok());
        assert!(!pump.states.get(&Track::Video).unwrap().codec_config_sent);
    }
}
