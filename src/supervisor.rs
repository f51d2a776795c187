//! Supervisor (C7): owns start/stop, the keep-alive timer, and reconnect
//! with backoff (§4.7).

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::IngestConfig;
use crate::endpoint::{Endpoint, EndpointPolicy};
use crate::error::RtmpError;
use crate::flv::{AudioChannels, StreamMetadata};
use crate::handshake::perform_client_handshake;
use crate::media_pump::MediaPump;
use crate::metrics::{MetricsCounters, MetricsSnapshot, ThermalState};
use crate::producer::{FrameProducer, Track};
use crate::protocol::{self, EngineEvent, ProtocolEngine, Session};
use crate::transport::{RtmpStream, ShutdownHandle};

/// What the embedding application supplies at session start.
pub struct PublishRequest {
    pub endpoint: Endpoint,
    pub stream_key: String,
    pub metadata: StreamMetadata,
    pub audio_channels: AudioChannels,
}

/// The callback surface exposed to external controllers (§6).
pub struct SupervisorCallbacks {
    pub on_publish_started: Box<dyn Fn() + Send + Sync>,
    pub on_disconnected: Box<dyn Fn(&RtmpError) + Send + Sync>,
    pub on_metrics: Box<dyn Fn(MetricsSnapshot) + Send + Sync>,
}

enum SessionEnd {
    Clean,
    Failed(RtmpError),
}

pub struct Supervisor {
    config: IngestConfig,
    policy: Box<dyn EndpointPolicy>,
    shutting_down: Arc<AtomicBool>,
    reconnect_count: Arc<AtomicU32>,
    shutdown_handle: Mutex<Option<ShutdownHandle>>,
    graceful_stop: Mutex<Option<(Arc<protocol::WriterLane>, String, u32)>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new(config: IngestConfig, policy: Box<dyn EndpointPolicy>) -> Arc<Self> {
        Arc::new(Self {
            config,
            policy,
            shutting_down: Arc::new(AtomicBool::new(false)),
            reconnect_count: Arc::new(AtomicU32::new(0)),
            shutdown_handle: Mutex::new(None),
            graceful_stop: Mutex::new(None),
            join: Mutex::new(None),
        })
    }

    /// Starts the publish session on a background thread. `video_producer`
    /// and `audio_producer` are reused across reconnect attempts — only the
    /// RTMP session restarts, per §4.7 ("stream key, URL, and encoder
    /// config are preserved").
    pub fn start(
        self: &Arc<Self>,
        request: PublishRequest,
        video_producer: Box<dyn FrameProducer>,
        audio_producer: Box<dyn FrameProducer>,
        callbacks: SupervisorCallbacks,
    ) {
        let supervisor = self.clone();
        let handle = thread::Builder::new()
            .name("rtmp-supervisor".to_string())
            .spawn(move || supervisor.run_with_reconnect(request, video_producer, audio_producer, callbacks))
            .expect("failed to spawn supervisor thread");
        *self.join.lock().expect("join mutex poisoned") = Some(handle);
    }

    fn run_with_reconnect(
        &self,
        request: PublishRequest,
        mut video_producer: Box<dyn FrameProducer>,
        mut audio_producer: Box<dyn FrameProducer>,
        callbacks: SupervisorCallbacks,
    ) {
        let mut attempt = 0u32;
        loop {
            if self.shutting_down.load(Ordering::SeqCst) {
                break;
            }

            let result = self.run_one_session(&request, video_producer.as_mut(), audio_producer.as_mut(), &callbacks);
            *self.graceful_stop.lock().expect("graceful stop mutex poisoned") = None;
            *self.shutdown_handle.lock().expect("shutdown handle mutex poisoned") = None;

            match result {
                SessionEnd::Clean => break,
                SessionEnd::Failed(err) => {
                    // An explicit `stop()` closes the socket to unblock the
                    // lanes, which otherwise surfaces as a generic Io/Channel
                    // error indistinguishable from a real network failure.
                    let shutting_down = self.shutting_down.load(Ordering::SeqCst);
                    let err = if shutting_down { RtmpError::UserCancelled } else { err };
                    (callbacks.on_disconnected)(&err);

                    if shutting_down || !err.is_retryable() {
                        break;
                    }
                    if attempt >= self.config.max_reconnect_attempts {
                        warn!(attempt, "max reconnect attempts reached, giving up");
                        break;
                    }

                    let backoff_ms = self.config.initial_backoff_ms.saturating_mul(1u64 << attempt);
                    info!(attempt, backoff_ms, "reconnecting after backoff");
                    thread::sleep(Duration::from_millis(backoff_ms));
                    attempt += 1;
                    self.reconnect_count.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    fn run_one_session(
        &self,
        request: &PublishRequest,
        video_producer: &mut dyn FrameProducer,
        audio_producer: &mut dyn FrameProducer,
        callbacks: &SupervisorCallbacks,
    ) -> SessionEnd {
        match self.try_run_one_session(request, video_producer, audio_producer, callbacks) {
            Ok(()) => SessionEnd::Clean,
            Err(err) => SessionEnd::Failed(err),
        }
    }

    fn try_run_one_session(
        &self,
        request: &PublishRequest,
        video_producer: &mut dyn FrameProducer,
        audio_producer: &mut dyn FrameProducer,
        callbacks: &SupervisorCallbacks,
    ) -> Result<(), RtmpError> {
        let endpoint = request.endpoint.clone().normalize(self.policy.as_ref());
        info!(host = %endpoint.host, port = endpoint.port, tls = endpoint.use_tls, "connecting");

        let mut stream = RtmpStream::connect(&endpoint, &self.config)?;
        perform_client_handshake(&mut stream)?;
        let (read_half, write_half, shutdown_handle) = stream.split();
        *self.shutdown_handle.lock().expect("shutdown handle mutex poisoned") = Some(shutdown_handle);

        let writer = Arc::new(protocol::WriterLane::new(write_half));
        let reader = crate::chunk::ChunkReader::new(read_half);
        let session = Session::new(endpoint, request.stream_key.clone(), self.config.ack_window_threshold);
        let last_inbound_at = Arc::new(Mutex::new(Instant::now()));
        let mut engine = ProtocolEngine::new(
            session,
            reader,
            writer.clone(),
            self.config.rtmp_chunk_size,
            last_inbound_at.clone(),
        );

        engine.begin_connect_sequence()?;
        let stream_id = self.await_publish_start(&mut engine)?;

        *self.graceful_stop.lock().expect("graceful stop mutex poisoned") =
            Some((writer.clone(), request.stream_key.clone(), stream_id));

        engine.clear_read_timeout().map_err(RtmpError::Io)?;
        engine.send_metadata(&request.metadata)?;
        (callbacks.on_publish_started)();
        info!(masked_key = %engine.session().masked_stream_key(), stream_id, "publishing");

        self.run_lanes(
            engine,
            writer,
            stream_id,
            request.audio_channels,
            video_producer,
            audio_producer,
            callbacks,
            last_inbound_at,
        )
    }

    fn await_publish_start(&self, engine: &mut ProtocolEngine) -> Result<u32, RtmpError> {
        let deadline = Instant::now() + Duration::from_millis(self.config.publish_start_timeout_ms);
        loop {
            if Instant::now() >= deadline {
                return Err(RtmpError::PublishStartTimeout);
            }
            match engine.dispatch_once() {
                Ok(EngineEvent::PublishStarted { stream_id }) => return Ok(stream_id),
                Ok(EngineEvent::PublishRejected(err)) => return Err(err),
                Ok(EngineEvent::None) => continue,
                Err(RtmpError::Io(io_err))
                    if matches!(io_err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Err(RtmpError::PublishStartTimeout);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Runs the reader/dispatch, video pump, audio pump and keep-alive
    /// lanes concurrently (§5) until the first one reports completion or
    /// failure, then closes the socket to unblock the rest.
    fn run_lanes(
        &self,
        mut engine: ProtocolEngine,
        writer: Arc<protocol::WriterLane>,
        stream_id: u32,
        audio_channels: AudioChannels,
        video_producer: &mut dyn FrameProducer,
        audio_producer: &mut dyn FrameProducer,
        callbacks: &SupervisorCallbacks,
        last_inbound_at: Arc<Mutex<Instant>>,
    ) -> Result<(), RtmpError> {
        let session_ending = Arc::new(AtomicBool::new(false));
        let session_start = Instant::now();
        let counters = Arc::new(MetricsCounters::default());
        let session_start_ts_us = Arc::new(std::sync::OnceLock::new());

        thread::scope(|scope| {
            let (tx, rx) = crossbeam_channel::bounded::<Result<(), RtmpError>>(4);

            let dispatch_tx = tx.clone();
            scope.spawn(move || {
                let result = loop {
                    match engine.dispatch_once() {
                        Ok(EngineEvent::PublishRejected(err)) => break Err(err),
                        Ok(_) => continue,
                        Err(err) => break Err(err),
                    }
                };
                for (id, kind) in engine.session().transactions.unclaimed() {
                    warn!(id, ?kind, "transaction still unclaimed at session teardown");
                }
                let _ = dispatch_tx.send(result);
            });

            let video_tx = tx.clone();
            let video_writer = writer.clone();
            let video_counters = counters.clone();
            let video_epoch = session_start_ts_us.clone();
            scope.spawn(move || {
                let mut pump = MediaPump::new(video_writer, stream_id, audio_channels, video_counters, video_epoch);
                let _ = video_tx.send(pump.pump_track(Track::Video, video_producer));
            });

            let audio_tx = tx.clone();
            let audio_writer = writer.clone();
            let audio_counters = counters.clone();
            let audio_epoch = session_start_ts_us;
            scope.spawn(move || {
                let mut pump = MediaPump::new(audio_writer, stream_id, audio_channels, audio_counters, audio_epoch);
                let _ = audio_tx.send(pump.pump_track(Track::Audio, audio_producer));
            });

            let keepalive_tx = tx.clone();
            let keepalive_writer = writer;
            let ending = session_ending.clone();
            let interval = Duration::from_millis(self.config.keep_alive_interval_ms);
            let idle_threshold = Duration::from_millis(self.config.keep_alive_idle_threshold_ms);
            scope.spawn(move || {
                let result =
                    run_keep_alive_timer(&keepalive_writer, &ending, &last_inbound_at, interval, idle_threshold);
                let _ = keepalive_tx.send(result);
            });

            let metrics_tx = tx;
            let metrics_ending = session_ending.clone();
            scope.spawn(move || {
                run_metrics_timer(
                    &counters,
                    &metrics_ending,
                    session_start,
                    self.reconnect_count.as_ref(),
                    callbacks,
                );
                let _ = metrics_tx.send(Ok(()));
            });

            let outcome = rx.recv().unwrap_or(Err(RtmpError::ChannelClosed));
            session_ending.store(true, Ordering::SeqCst);
            if let Some(handle) = self.shutdown_handle.lock().expect("shutdown handle mutex poisoned").as_ref() {
                let _ = handle.shutdown();
            }
            outcome
        })
    }

    /// Mark the supervisor as stopping, best-effort tell the server the
    /// stream is ending, then close the socket and join the supervisor
    /// thread. Idempotent.
    pub fn stop(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);

        if let Some((writer, stream_key, stream_id)) =
            self.graceful_stop.lock().expect("graceful stop mutex poisoned").take()
        {
            if let Ok(msg) = crate::protocol::commands::fc_unpublish(&stream_key) {
                let _ = writer.send(&msg);
            }
            if let Ok(msg) = crate::protocol::commands::delete_stream(0.0, stream_id) {
                let _ = writer.send(&msg);
            }
        }

        if let Some(handle) = self.shutdown_handle.lock().expect("shutdown handle mutex poisoned").as_ref() {
            let _ = handle.shutdown();
        }

        if let Some(handle) = self.join.lock().expect("join mutex poisoned").take() {
            let _ = handle.join();
        }
    }

    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count.load(Ordering::SeqCst)
    }
}

/// Samples the Media Pump's raw counters once a second and reports a
/// `MetricsSnapshot` via `callbacks.on_metrics` (§3, §6: "periodic, e.g.
/// 1 Hz"). Bitrate is a rolling average over the last 10 one-second
/// samples. There is no internal send queue in this architecture (writes
/// go straight to the writer lane and block on the OS socket buffer), so
/// `upload_queue_seconds` is always reported as zero, and there is no
/// host-thermal API in scope, so `thermal_state` is always `Nominal`.
fn run_metrics_timer(
    counters: &MetricsCounters,
    session_ending: &AtomicBool,
    session_start: Instant,
    reconnect_count: &AtomicU32,
    callbacks: &SupervisorCallbacks,
) {
    const POLL: Duration = Duration::from_millis(200);
    const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
    const WINDOW: usize = 10;

    let mut bitrate_window: Vec<f64> = Vec::with_capacity(WINDOW);
    let (mut last_frames, mut last_bytes) = counters.snapshot_raw();

    loop {
        let mut waited = Duration::ZERO;
        while waited < SAMPLE_INTERVAL {
            if session_ending.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(POLL);
            waited += POLL;
        }

        let (frames, bytes_sent) = counters.snapshot_raw();
        let fps = frames.saturating_sub(last_frames) as f64 / SAMPLE_INTERVAL.as_secs_f64();
        let kbps = (bytes_sent.saturating_sub(last_bytes) as f64 * 8.0 / 1000.0) / SAMPLE_INTERVAL.as_secs_f64();
        last_frames = frames;
        last_bytes = bytes_sent;

        if bitrate_window.len() == WINDOW {
            bitrate_window.remove(0);
        }
        bitrate_window.push(kbps);
        let bitrate_kbps_10s_avg = bitrate_window.iter().sum::<f64>() / bitrate_window.len() as f64;

        (callbacks.on_metrics)(MetricsSnapshot {
            fps,
            bitrate_kbps_10s_avg,
            upload_queue_seconds: 0.0,
            reconnect_count: reconnect_count.load(Ordering::SeqCst),
            thermal_state: ThermalState::Nominal,
            session_duration: session_start.elapsed(),
        });
    }
}

/// Pings the peer when the dispatch lane hasn't seen an inbound byte for at
/// least `idle_threshold` (§4.7). `interval` is the minimum gap between two
/// pings of our own, so a peer that stays silent after a ping doesn't get
/// flooded every poll tick while we wait for its `PingResponse` to refresh
/// `last_inbound_at`.
fn run_keep_alive_timer(
    writer: &protocol::WriterLane,
    session_ending: &AtomicBool,
    last_inbound_at: &Mutex<Instant>,
    interval: Duration,
    idle_threshold: Duration,
) -> Result<(), RtmpError> {
    const POLL: Duration = Duration::from_millis(200);
    let mut last_ping_sent = Instant::now() - interval;

    loop {
        if session_ending.load(Ordering::SeqCst) {
            return Ok(());
        }
        thread::sleep(POLL);

        let idle = last_inbound_at.lock().expect("last inbound mutex poisoned").elapsed();
        if idle >= idle_threshold && last_ping_sent.elapsed() >= interval {
            let wall_clock_low32 = Instant::now().elapsed().as_millis() as u32;
            writer.send(&crate::protocol::control::ping_request(wall_clock_low32))?;
            last_ping_sent = Instant::now();
        }
    }
}
