//! Connection transport: plain TCP or TLS-over-TCP (§6). TLS sets SNI to the
//! connect host and prefers TLS 1.3 then TLS 1.2; sockets set `TCP_NODELAY`
//! and `SO_KEEPALIVE` true regardless of scheme.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use crate::config::IngestConfig;
use crate::endpoint::Endpoint;
use crate::error::RtmpError;

static ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();

fn root_store() -> Result<Arc<RootCertStore>, RtmpError> {
    if let Some(store) = ROOTS.get() {
        return Ok(store.clone());
    }
    let mut store = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in native.errors {
        tracing::warn!(%err, "failed to load a native root certificate");
    }
    for cert in native.certs {
        // Malformed individual certs are skipped rather than failing the
        // whole connection attempt.
        let _ = store.add(cert);
    }
    let store = Arc::new(store);
    let _ = ROOTS.set(store.clone());
    Ok(store)
}

fn client_config() -> Result<Arc<ClientConfig>, RtmpError> {
    let roots = root_store()?;
    let config = ClientConfig::builder()
        .with_root_certificates((*roots).clone())
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Either half of the duplex stream the handshake, chunk reader and chunk
/// writer run over — transport-agnostic by design (§6).
pub enum RtmpStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl RtmpStream {
    pub fn connect(endpoint: &Endpoint, config: &IngestConfig) -> Result<Self, RtmpError> {
        let addr = format!("{}:{}", endpoint.host, endpoint.port);
        let tcp = TcpStream::connect(&addr)?;
        tcp.set_nodelay(config.tcp_nodelay)?;
        // Bounds the handshake and the await-Publishing phase; cleared via
        // `RtmpReadHalf::set_read_timeout(None)` once Publishing begins, so
        // steady-state reads block until data, an error, or a Supervisor-
        // initiated shutdown (the universal cancellation primitive, §5).
        tcp.set_read_timeout(Some(Duration::from_millis(config.publish_start_timeout_ms)))?;
        configure_keepalive(&tcp, config.so_keepalive)?;

        if !endpoint.use_tls {
            return Ok(RtmpStream::Plain(tcp));
        }

        let tls_config = client_config()?;
        let server_name = ServerName::try_from(endpoint.host.clone())
            .map_err(|_| RtmpError::Dns(endpoint.host.clone()))?;
        let conn = ClientConnection::new(tls_config, server_name)?;
        Ok(RtmpStream::Tls(Box::new(StreamOwned::new(conn, tcp))))
    }

    /// Splits the stream into independent read/write handles for the
    /// reader and writer lanes (§5). Plain TCP gets genuinely independent
    /// handles via `try_clone` — two fds over one socket, safe for
    /// concurrent read/write from different threads. The TLS path shares a
    /// single `ClientConnection` behind a mutex between both handles, since
    /// rustls' connection state is mutated by both directions; this trades
    /// a little lane independence for a connection type the teacher never
    /// actually wired up.
    pub fn split(self) -> (RtmpReadHalf, RtmpWriteHalf, ShutdownHandle) {
        match self {
            RtmpStream::Plain(s) => {
                let write_half = s.try_clone().expect("tcp stream clone for writer lane");
                let shutdown_handle = s.try_clone().expect("tcp stream clone for shutdown handle");
                (
                    RtmpReadHalf::Plain(s),
                    RtmpWriteHalf::Plain(write_half),
                    ShutdownHandle::Plain(shutdown_handle),
                )
            }
            RtmpStream::Tls(s) => {
                let shared = Arc::new(Mutex::new(*s));
                (
                    RtmpReadHalf::Tls(shared.clone()),
                    RtmpWriteHalf::Tls(shared.clone()),
                    ShutdownHandle::Tls(shared),
                )
            }
        }
    }
}

/// Lets the Supervisor sever the connection from outside the reader/writer
/// lanes — the universal cancellation primitive (§5): every blocking lane
/// detects the resulting I/O error or EOF and exits.
pub enum ShutdownHandle {
    Plain(TcpStream),
    Tls(Arc<Mutex<StreamOwned<ClientConnection, TcpStream>>>),
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> io::Result<()> {
        match self {
            ShutdownHandle::Plain(s) => s.shutdown(std::net::Shutdown::Both),
            ShutdownHandle::Tls(s) => s
                .lock()
                .expect("tls stream mutex poisoned")
                .sock
                .shutdown(std::net::Shutdown::Both),
        }
    }
}

pub enum RtmpReadHalf {
    Plain(TcpStream),
    Tls(Arc<Mutex<StreamOwned<ClientConnection, TcpStream>>>),
}

impl Read for RtmpReadHalf {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RtmpReadHalf::Plain(s) => s.read(buf),
            RtmpReadHalf::Tls(s) => s.lock().expect("tls stream mutex poisoned").read(buf),
        }
    }
}

impl RtmpReadHalf {
    /// `None` blocks indefinitely — used once Publishing begins, since
    /// liveness from then on is monitored via keep-alive ping/pong and
    /// TCP-level keepalive, not read timeouts.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            RtmpReadHalf::Plain(s) => s.set_read_timeout(timeout),
            RtmpReadHalf::Tls(s) => s
                .lock()
                .expect("tls stream mutex poisoned")
                .sock
                .set_read_timeout(timeout),
        }
    }
}

pub enum RtmpWriteHalf {
    Plain(TcpStream),
    Tls(Arc<Mutex<StreamOwned<ClientConnection, TcpStream>>>),
}

impl Write for RtmpWriteHalf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            RtmpWriteHalf::Plain(s) => s.write(buf),
            RtmpWriteHalf::Tls(s) => s.lock().expect("tls stream mutex poisoned").write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            RtmpWriteHalf::Plain(s) => s.flush(),
            RtmpWriteHalf::Tls(s) => s.lock().expect("tls stream mutex poisoned").flush(),
        }
    }
}

fn configure_keepalive(stream: &TcpStream, enabled: bool) -> io::Result<()> {
    let socket = socket2::SockRef::from(stream);
    socket.set_keepalive(enabled)
}

impl Read for RtmpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RtmpStream::Plain(s) => s.read(buf),
            RtmpStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for RtmpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            RtmpStream::Plain(s) => s.write(buf),
            RtmpStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            RtmpStream::Plain(s) => s.flush(),
            RtmpStream::Tls(s) => s.flush(),
        }
    }
}
