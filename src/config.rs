//! Session configuration (§6, §9: "no global mutable state" — configuration
//! is a value passed at construction, not a process-wide statics object).

use serde::Deserialize;

use crate::flv::StreamMetadata;

/// Every row of §6's configuration table, plus the transport knobs a real
/// TLS/TCP stack needs that the distilled table left implicit.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub rtmp_chunk_size: usize,
    pub ack_window_threshold: f64,
    pub max_reconnect_attempts: u32,
    pub initial_backoff_ms: u64,
    pub publish_start_timeout_ms: u64,
    pub keep_alive_interval_ms: u64,
    pub keep_alive_idle_threshold_ms: u64,
    pub connect_timeout_ms: u64,
    pub tcp_nodelay: bool,
    pub so_keepalive: bool,
    pub preset: Preset,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            rtmp_chunk_size: 4096,
            ack_window_threshold: 0.6,
            max_reconnect_attempts: 5,
            initial_backoff_ms: 500,
            publish_start_timeout_ms: 60_000,
            keep_alive_interval_ms: 10_000,
            keep_alive_idle_threshold_ms: 8_000,
            connect_timeout_ms: 10_000,
            tcp_nodelay: true,
            so_keepalive: true,
            preset: Preset::default(),
        }
    }
}

/// Encoder preset, a plain record (§6's `preset` row / §9's "presets are
/// ordinary records").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub profile: String,
    pub level: String,
    pub gop_seconds: u32,
    pub b_frames: u32,
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 60,
            video_bitrate_kbps: 6_000,
            audio_bitrate_kbps: 160,
            profile: "high".to_string(),
            level: "4.2".to_string(),
            gop_seconds: 2,
            b_frames: 0,
        }
    }
}

impl Preset {
    /// Builds the `onMetaData`-bound `StreamMetadata` for this preset. Audio
    /// sample rate/size/channel count aren't preset fields — they describe
    /// the encoder's raw PCM format, not a picture/bitrate quality tier —
    /// so the caller supplies them alongside the encoder identifier string.
    pub fn to_stream_metadata(
        &self,
        audio_sample_rate: u32,
        audio_sample_size: u32,
        audio_channels: u32,
        encoder: impl Into<String>,
    ) -> StreamMetadata {
        StreamMetadata {
            width: self.width,
            height: self.height,
            framerate: self.fps as f64,
            video_bitrate_kbps: self.video_bitrate_kbps,
            audio_bitrate_kbps: self.audio_bitrate_kbps,
            audio_sample_rate,
            audio_sample_size,
            audio_channels,
            encoder: encoder.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_documented_defaults() {
        let cfg = IngestConfig::default();
        assert_eq!(cfg.rtmp_chunk_size, 4096);
        assert_eq!(cfg.ack_window_threshold, 0.6);
        assert_eq!(cfg.max_reconnect_attempts, 5);
        assert_eq!(cfg.preset.width, 1280);
        assert_eq!(cfg.preset.height, 720);
        assert_eq!(cfg.preset.fps, 60);
    }
}
