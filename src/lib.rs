//! RTMP/RTMPS live-ingest client.
//!
//! Streams H.264 video and AAC audio from an external encoder to an RTMP
//! (or RTMPS) server, speaking just enough of the protocol to publish: the
//! simple handshake, chunk stream multiplexing, AMF0 commands, FLV tag
//! framing for Audio/Video/onMetaData messages, and the connect → publish
//! command sequence, wrapped in a Supervisor that reconnects with backoff
//! and reports liveness via a keep-alive ping.
//!
//! ```no_run
//! use rtmp_ingest::{
//!     Endpoint, IdentityPolicy, IngestConfig, PublishRequest, StreamMetadata,
//!     AudioChannels, Supervisor, SupervisorCallbacks,
//! };
//!
//! let endpoint = Endpoint {
//!     host: "example.com".to_string(),
//!     port: 1935,
//!     app: "live".to_string(),
//!     tc_url: "rtmp://example.com/live".to_string(),
//!     use_tls: false,
//! };
//!
//! let supervisor = Supervisor::new(IngestConfig::default(), Box::new(IdentityPolicy));
//! let callbacks = SupervisorCallbacks {
//!     on_publish_started: Box::new(|| {}),
//!     on_disconnected: Box::new(|_err| {}),
//!     on_metrics: Box::new(|_snapshot| {}),
//! };
//! # struct NullProducer;
//! # impl rtmp_ingest::FrameProducer for NullProducer {
//! #     fn recv_timeout(&mut self, _track: rtmp_ingest::Track, _timeout: std::time::Duration)
//! #         -> Result<Option<rtmp_ingest::EncodedFrame>, rtmp_ingest::RtmpError> { Ok(None) }
//! # }
//! let request = PublishRequest {
//!     endpoint,
//!     stream_key: "XXXX-YYYY-ZZZZ-WWWW".to_string(),
//!     metadata: StreamMetadata {
//!         width: 1280,
//!         height: 720,
//!         framerate: 60.0,
//!         video_bitrate_kbps: 6_000,
//!         audio_bitrate_kbps: 160,
//!         audio_sample_rate: 48_000,
//!         audio_sample_size: 16,
//!         audio_channels: 2,
//!         encoder: "rtmp-ingest".to_string(),
//!     },
//!     audio_channels: AudioChannels::Stereo,
//! };
//! supervisor.start(request, Box::new(NullProducer), Box::new(NullProducer), callbacks);
//! ```

mod amf0;
mod chunk;
mod config;
mod endpoint;
mod error;
mod flv;
mod handshake;
mod media_pump;
mod message;
mod metrics;
mod producer;
mod protocol;
mod supervisor;
mod transport;

pub use config::{IngestConfig, Preset};
pub use endpoint::{Endpoint, EndpointPolicy, IdentityPolicy, YouTubePolicy};
pub use error::{ErrorCategory, RtmpError};
pub use flv::{AudioChannels, StreamMetadata};
pub use metrics::{MetricsSnapshot, ThermalState};
pub use producer::{EncodedFrame, FrameProducer, Track};
pub use supervisor::{PublishRequest, Supervisor, SupervisorCallbacks};
