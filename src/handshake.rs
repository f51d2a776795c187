//! The "simple" RTMP handshake (C0/C1/C2 against S0/S1/S2). Servers that
//! require the complex digest-based handshake are out of scope; a
//! connection against one of those will complete this handshake but then
//! stall on the first command, surfacing as a `PublishStartTimeout` rather
//! than a handshake error.

use std::io::{Read, Write};

use rand::RngCore;
use tracing::debug;

use crate::error::RtmpError;

const RTMP_VERSION: u8 = 3;
const HANDSHAKE_SIZE: usize = 1536;

/// Performs the client side of the handshake over an already-connected
/// (and, if applicable, already TLS-wrapped) stream.
pub fn perform_client_handshake<S: Read + Write>(stream: &mut S) -> Result<(), RtmpError> {
    let mut c1 = [0u8; HANDSHAKE_SIZE];
    c1[0..4].copy_from_slice(&0u32.to_be_bytes());
    c1[4..8].fill(0);
    rand::rng().fill_bytes(&mut c1[8..]);

    stream.write_all(&[RTMP_VERSION])?;
    stream.write_all(&c1)?;
    stream.flush()?;

    let mut s0 = [0u8; 1];
    read_exact_or_truncated(stream, &mut s0, "S0")?;
    if s0[0] != RTMP_VERSION {
        return Err(RtmpError::HandshakeVersionMismatch(s0[0]));
    }

    let mut s1 = [0u8; HANDSHAKE_SIZE];
    read_exact_or_truncated(stream, &mut s1, "S1")?;

    // C2 echoes S1 verbatim.
    stream.write_all(&s1)?;
    stream.flush()?;

    let mut s2 = [0u8; HANDSHAKE_SIZE];
    read_exact_or_truncated(stream, &mut s2, "S2")?;

    debug!("rtmp handshake complete");
    Ok(())
}

/// `read_exact` that distinguishes "peer closed the connection mid-handshake"
/// from an ordinary I/O failure, so a truncated S0/S1/S2 is reported as a
/// handshake error rather than a generic `RtmpError::Io`.
fn read_exact_or_truncated<S: Read>(stream: &mut S, buf: &mut [u8], what: &'static str) -> Result<(), RtmpError> {
    match stream.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(RtmpError::HandshakeTruncated(what)),
        Err(e) => Err(RtmpError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// A tiny in-memory duplex stream good enough to drive the client side
    /// of the handshake against a scripted server response.
    struct LoopbackPeer {
        inbound: Cursor<Vec<u8>>,
        outbound: Vec<u8>,
    }

    impl Read for LoopbackPeer {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inbound.read(buf)
        }
    }

    impl Write for LoopbackPeer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.outbound.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn scripted_server_response() -> Vec<u8> {
        let mut response = Vec::with_capacity(1 + HANDSHAKE_SIZE * 2);
        response.push(RTMP_VERSION);
        response.extend(std::iter::repeat(0xAB).take(HANDSHAKE_SIZE)); // S1
        response.extend(std::iter::repeat(0xCD).take(HANDSHAKE_SIZE)); // S2
        response
    }

    #[test]
    fn client_handshake_sends_c0_c1_then_echoes_s1_as_c2() {
        let mut peer = LoopbackPeer {
            inbound: Cursor::new(scripted_server_response()),
            outbound: Vec::new(),
        };

        perform_client_handshake(&mut peer).unwrap();

        assert_eq!(peer.outbound[0], RTMP_VERSION);
        let c1 = &peer.outbound[1..1 + HANDSHAKE_SIZE];
        assert_eq!(&c1[4..8], &[0, 0, 0, 0]);

        let c2 = &peer.outbound[1 + HANDSHAKE_SIZE..1 + 2 * HANDSHAKE_SIZE];
        assert!(c2.iter().all(|&b| b == 0xAB), "C2 must echo S1 verbatim");
    }

    #[test]
    fn wrong_s0_version_is_rejected() {
        let mut response = vec![5u8];
        response.extend(std::iter::repeat(0).take(HANDSHAKE_SIZE * 2));
        let mut peer = LoopbackPeer {
            inbound: Cursor::new(response),
            outbound: Vec::new(),
        };

        let err = perform_client_handshake(&mut peer).unwrap_err();
        assert!(matches!(err, RtmpError::HandshakeVersionMismatch(5)));
    }

    #[test]
    fn connection_closed_mid_s1_is_reported_as_truncated() {
        let mut response = vec![RTMP_VERSION];
        response.extend(std::iter::repeat(0xAB).take(HANDSHAKE_SIZE / 2)); // S1 cut short
        let mut peer = LoopbackPeer {
            inbound: Cursor::new(response),
            outbound: Vec::new(),
        };

        let err = perform_client_handshake(&mut peer).unwrap_err();
        assert!(matches!(err, RtmpError::HandshakeTruncated("S1")));
    }
}
