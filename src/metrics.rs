//! Metrics snapshot (§3, §6 `on_metrics` callback). Produced by the
//! Supervisor at roughly 1 Hz; consumed by an external UI layer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalState {
    Nominal,
    Fair,
    Serious,
    Critical,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub fps: f64,
    pub bitrate_kbps_10s_avg: f64,
    pub upload_queue_seconds: f64,
    pub reconnect_count: u32,
    pub thermal_state: ThermalState,
    pub session_duration: Duration,
}

impl MetricsSnapshot {
    /// A human-readable one-liner, supplementing the raw fields above for
    /// the demo CLI — not part of the core data model.
    pub fn summary(&self) -> String {
        format!(
            "{:.1} fps, {:.0} kbps (10s avg), {:.1}s queued, {} reconnects, {:?}, up {:.0}s",
            self.fps,
            self.bitrate_kbps_10s_avg,
            self.upload_queue_seconds,
            self.reconnect_count,
            self.thermal_state,
            self.session_duration.as_secs_f64()
        )
    }
}

/// Raw counters the Media Pump increments on every sent frame, sampled once
/// a second by the Supervisor's metrics timer to derive fps/bitrate. There
/// is no internal send queue to measure for `upload_queue_seconds` — writes
/// go straight to the writer lane and block until the OS socket buffer
/// accepts them — so that field is always reported as zero.
#[derive(Default)]
pub(crate) struct MetricsCounters {
    video_frames: AtomicU64,
    bytes_sent: AtomicU64,
}

impl MetricsCounters {
    pub fn record_video_frame(&self) {
        self.video_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bytes(&self, n: usize) {
        self.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot_raw(&self) -> (u64, u64) {
        (
            self.video_frames.load(Ordering::Relaxed),
            self.bytes_sent.load(Ordering::Relaxed),
        )
    }
}
