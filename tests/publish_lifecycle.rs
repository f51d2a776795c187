//! Black-box lifecycle tests driven entirely through the public `Supervisor`
//! API against loopback TCP peers standing in for an RTMP server. None of
//! these peers speak real RTMP — they only exercise the connect/retry/stop
//! paths that don't require a scripted handshake response.

use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rtmp_ingest::{
    AudioChannels, Endpoint, EncodedFrame, ErrorCategory, FrameProducer, IdentityPolicy,
    IngestConfig, PublishRequest, RtmpError, StreamMetadata, Supervisor, SupervisorCallbacks,
    Track,
};

struct NullProducer;

impl FrameProducer for NullProducer {
    fn recv_timeout(&mut self, _track: Track, timeout: Duration) -> Result<Option<EncodedFrame>, RtmpError> {
        std::thread::sleep(timeout);
        Ok(None)
    }
}

fn loopback_endpoint(port: u16) -> Endpoint {
    Endpoint {
        host: "127.0.0.1".to_string(),
        port,
        app: "live".to_string(),
        tc_url: format!("rtmp://127.0.0.1:{port}/live"),
        use_tls: false,
    }
}

fn test_request(endpoint: Endpoint) -> PublishRequest {
    PublishRequest {
        endpoint,
        stream_key: "test-key".to_string(),
        metadata: StreamMetadata {
            width: 1280,
            height: 720,
            framerate: 30.0,
            video_bitrate_kbps: 2_000,
            audio_bitrate_kbps: 128,
            audio_sample_rate: 44_100,
            audio_sample_size: 16,
            audio_channels: 2,
            encoder: "test".to_string(),
        },
        audio_channels: AudioChannels::Stereo,
    }
}

/// A closed port (bound then immediately dropped) refuses the connection
/// outright. The Supervisor must surface this via `on_disconnected` as a
/// retryable `Network` error and keep retrying up to its configured cap.
#[test]
fn connection_refused_is_reported_and_retried_with_backoff() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = IngestConfig::default();
    config.max_reconnect_attempts = 2;
    config.initial_backoff_ms = 10;
    config.publish_start_timeout_ms = 500;

    let supervisor = Supervisor::new(config, Box::new(IdentityPolicy));
    let disconnect_count = Arc::new(AtomicU32::new(0));
    let last_category = Arc::new(Mutex::new(None::<ErrorCategory>));

    let counter = disconnect_count.clone();
    let category = last_category.clone();
    let callbacks = SupervisorCallbacks {
        on_publish_started: Box::new(|| panic!("publish should never start against a refused connection")),
        on_disconnected: Box::new(move |err: &RtmpError| {
            counter.fetch_add(1, Ordering::SeqCst);
            *category.lock().unwrap() = Some(err.category());
        }),
        on_metrics: Box::new(|_| {}),
    };

    supervisor.start(
        test_request(loopback_endpoint(port)),
        Box::new(NullProducer),
        Box::new(NullProducer),
        callbacks,
    );

    let deadline = Instant::now() + Duration::from_secs(10);
    while disconnect_count.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }

    assert!(disconnect_count.load(Ordering::SeqCst) >= 1, "expected at least one on_disconnected call");
    assert_eq!(*last_category.lock().unwrap(), Some(ErrorCategory::Network));

    supervisor.stop();
}

/// A listener that accepts but never completes the handshake stands in for
/// a hung server. `publish_start_timeout_ms` bounds the connect/handshake
/// phase, so the session must fail with a timeout-shaped error rather than
/// hang forever, and `stop()` must still return promptly.
#[test]
fn stalled_peer_times_out_and_stop_is_idempotent() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let accept_thread = std::thread::spawn(move || {
        // Accept and hold the connection open without writing anything, so
        // the client's handshake read blocks until its timeout fires.
        if let Ok((_socket, _)) = listener.accept() {
            std::thread::sleep(Duration::from_secs(5));
        }
    });

    let mut config = IngestConfig::default();
    config.max_reconnect_attempts = 0;
    config.publish_start_timeout_ms = 300;

    let supervisor = Supervisor::new(config, Box::new(IdentityPolicy));
    let disconnected = Arc::new(AtomicU32::new(0));
    let counter = disconnected.clone();
    let callbacks = SupervisorCallbacks {
        on_publish_started: Box::new(|| panic!("publish should never start against a stalled peer")),
        on_disconnected: Box::new(move |_err: &RtmpError| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        on_metrics: Box::new(|_| {}),
    };

    supervisor.start(
        test_request(loopback_endpoint(port)),
        Box::new(NullProducer),
        Box::new(NullProducer),
        callbacks,
    );

    let deadline = Instant::now() + Duration::from_secs(10);
    while disconnected.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(disconnected.load(Ordering::SeqCst), 1);

    // stop() must be safe to call after the session already ended on its
    // own, and safe to call twice.
    supervisor.stop();
    supervisor.stop();

    let _ = accept_thread.join();
}

/// `reconnect_count` starts at zero for a freshly constructed Supervisor
/// that never attempted a session.
#[test]
fn reconnect_count_starts_at_zero() {
    let supervisor = Supervisor::new(IngestConfig::default(), Box::new(IdentityPolicy));
    assert_eq!(supervisor.reconnect_count(), 0);
}
