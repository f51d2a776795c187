//! Demo CLI: publishes a synthetic H.264/AAC stream to a user-supplied
//! RTMP(S) URL to exercise the whole pipeline end to end. The `SyntheticProducer`
//! below is not an encoder — it emits pre-baked filler NALUs/AAC frames on a
//! timer purely to drive the wire protocol.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use rtmp_ingest::{
    AudioChannels, Endpoint, EncodedFrame, FrameProducer, IdentityPolicy, IngestConfig,
    MetricsSnapshot, PublishRequest, RtmpError, Supervisor, SupervisorCallbacks, Track,
    YouTubePolicy,
};

#[derive(Parser, Debug)]
#[command(about = "Publishes a synthetic test stream over RTMP/RTMPS")]
struct Args {
    /// RTMP(S) URL, e.g. rtmp://example.com/live or rtmps://a.rtmps.youtube.com/rtmp2
    #[arg(long)]
    url: String,

    /// Stream key appended to the URL's app path
    #[arg(long)]
    stream_key: String,

    /// Rewrite the endpoint for YouTube's RTMPS reference target
    #[arg(long)]
    youtube: bool,

    /// Video frame rate of the synthetic producer
    #[arg(long, default_value_t = 30.0)]
    fps: f64,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::Layer::default().compact().with_filter(filter);
    Registry::default().with(stdout_layer).init();
}

fn parse_url(url: &str) -> Result<Endpoint, String> {
    let parsed = url::Url::parse(url).map_err(|e| e.to_string())?;
    let use_tls = matches!(parsed.scheme(), "rtmps");
    let host = parsed.host_str().ok_or("url has no host")?.to_string();
    let port = parsed.port().unwrap_or(if use_tls { 443 } else { 1935 });
    let app = parsed.path().trim_matches('/').to_string();
    let tc_url = format!("{}://{}:{}/{}", parsed.scheme(), host, port, app);
    Ok(Endpoint {
        host,
        port,
        app,
        tc_url,
        use_tls,
    })
}

/// Emits one codec-config frame per track, then periodic filler frames at
/// `fps`/one-audio-frame-per-video-frame, purely to prove the pipeline wires
/// up correctly. Not a real encoder.
struct SyntheticProducer {
    track: Track,
    frame_interval: Duration,
    config_sent: bool,
    next_ts_us: Arc<AtomicU64>,
    last_emit: std::time::Instant,
}

impl SyntheticProducer {
    fn new(track: Track, frame_interval: Duration, next_ts_us: Arc<AtomicU64>) -> Self {
        Self {
            track,
            frame_interval,
            config_sent: false,
            next_ts_us,
            last_emit: std::time::Instant::now() - frame_interval,
        }
    }
}

impl FrameProducer for SyntheticProducer {
    fn recv_timeout(&mut self, track: Track, timeout: Duration) -> Result<Option<EncodedFrame>, RtmpError> {
        debug_assert_eq!(track, self.track);

        if !self.config_sent {
            self.config_sent = true;
            let data = match self.track {
                Track::Video => vec![0x01, 0x64, 0x00, 0x1f], // filler AVCDecoderConfigurationRecord
                Track::Audio => vec![0x11, 0x90],             // filler AudioSpecificConfig
            };
            return Ok(Some(EncodedFrame {
                track: self.track,
                is_codec_config: true,
                is_keyframe: false,
                data,
                presentation_ts_us: 0,
            }));
        }

        if self.last_emit.elapsed() < self.frame_interval {
            std::thread::sleep(timeout.min(self.frame_interval));
            return Ok(None);
        }

        self.last_emit = std::time::Instant::now();
        let ts_us = self.next_ts_us.fetch_add(self.frame_interval.as_micros() as u64, Ordering::SeqCst);
        Ok(Some(EncodedFrame {
            track: self.track,
            is_codec_config: false,
            is_keyframe: self.track == Track::Video,
            data: vec![0u8; 16],
            presentation_ts_us: ts_us,
        }))
    }
}

fn main() {
    init_logging();
    let args = Args::parse();

    let endpoint = match parse_url(&args.url) {
        Ok(endpoint) => endpoint,
        Err(err) => {
            eprintln!("invalid url: {err}");
            std::process::exit(1);
        }
    };

    let policy: Box<dyn rtmp_ingest::EndpointPolicy> = if args.youtube {
        Box::new(YouTubePolicy)
    } else {
        Box::new(IdentityPolicy)
    };

    let mut config = IngestConfig::default();
    config.preset.fps = args.fps as u32;
    let metadata = config.preset.to_stream_metadata(44_100, 16, 2, "rtmp-ingest demo_publish");

    let supervisor = Supervisor::new(config, policy);

    let video_interval = Duration::from_secs_f64(1.0 / args.fps);
    let audio_interval = Duration::from_millis(23); // ~1 AAC frame per 1024 samples @ 44.1kHz
    let shared_clock = Arc::new(AtomicU64::new(0));

    let callbacks = SupervisorCallbacks {
        on_publish_started: Box::new(|| println!("publish started")),
        on_disconnected: Box::new(|err: &RtmpError| println!("disconnected: {err}")),
        on_metrics: Box::new(|snapshot: MetricsSnapshot| println!("{}", snapshot.summary())),
    };

    let request = PublishRequest {
        endpoint,
        stream_key: args.stream_key,
        metadata,
        audio_channels: AudioChannels::Stereo,
    };

    let video_producer = SyntheticProducer::new(Track::Video, video_interval, shared_clock.clone());
    let audio_producer = SyntheticProducer::new(Track::Audio, audio_interval, shared_clock);

    supervisor.start(request, Box::new(video_producer), Box::new(audio_producer), callbacks);

    // start() runs the session on a background thread; the process exits
    // (and the OS tears down the socket) on Ctrl-C. `Supervisor::stop` is
    // there for embedding applications that manage their own lifecycle.
    loop {
        std::thread::sleep(Duration::from_secs(3600));
    }
}
