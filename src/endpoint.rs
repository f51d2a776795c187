//! Endpoint normalization (§3/§6/§9). The forced RTMPS rewrite for YouTube
//! is a pragmatic choice, not a protocol requirement, so it is expressed as
//! a pluggable policy rather than hard-coded into the connect path.

/// A normalized endpoint. Once constructed, all downstream code (transport,
/// handshake, protocol engine) uses these fields exclusively — nothing else
/// re-derives host/port/scheme from the caller-supplied URL.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub app: String,
    pub tc_url: String,
    pub use_tls: bool,
}

/// A pluggable normalization hook (§9: "the interface exposes it as a
/// pluggable hook so other CDNs can supply their own normalization").
pub trait EndpointPolicy: Send + Sync {
    fn normalize(&self, endpoint: Endpoint) -> Endpoint;
}

/// No-op policy: the caller-supplied endpoint is used verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityPolicy;

impl EndpointPolicy for IdentityPolicy {
    fn normalize(&self, endpoint: Endpoint) -> Endpoint {
        endpoint
    }
}

/// Reference target policy: coerces to RTMPS on 443, rewrites the
/// `a.rtmp.youtube.com` hostname to its RTMPS counterpart, and forces the
/// `rtmp2` app path — this avoids carrier blocks on port 1935.
#[derive(Debug, Default, Clone, Copy)]
pub struct YouTubePolicy;

impl EndpointPolicy for YouTubePolicy {
    fn normalize(&self, mut endpoint: Endpoint) -> Endpoint {
        if endpoint.host == "a.rtmp.youtube.com" {
            endpoint.host = "a.rtmps.youtube.com".to_string();
        }
        endpoint.use_tls = true;
        endpoint.port = 443;
        endpoint.app = "rtmp2".to_string();
        endpoint.tc_url = format!("rtmps://{}:{}/{}", endpoint.host, endpoint.port, endpoint.app);
        endpoint
    }
}

impl Endpoint {
    pub fn normalize(self, policy: &dyn EndpointPolicy) -> Self {
        policy.normalize(self)
    }
}
