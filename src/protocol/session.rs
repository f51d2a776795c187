use crate::endpoint::Endpoint;
use crate::protocol::state::PublishState;
use crate::protocol::transaction::TransactionTable;

/// One live publish attempt (§3). Exclusively owned by the Supervisor; the
/// Protocol Engine borrows it mutably while dispatching. Every reconnect
/// attempt constructs a fresh `Session` — nothing here survives a restart.
pub struct Session {
    pub endpoint: Endpoint,
    stream_key: String,
    pub chunk_size_in: usize,
    pub chunk_size_out: usize,
    pub peer_window: Option<u32>,
    pub ack_threshold_fraction: f64,
    pub transactions: TransactionTable,
    pub state: PublishState,
    pub stream_id: Option<u32>,
    pub total_bytes_read: u64,
    bytes_read_since_last_ack: u64,
}

impl Session {
    pub fn new(endpoint: Endpoint, stream_key: String, ack_threshold_fraction: f64) -> Self {
        Self {
            endpoint,
            stream_key,
            chunk_size_in: crate::chunk::DEFAULT_CHUNK_SIZE,
            chunk_size_out: crate::chunk::DEFAULT_CHUNK_SIZE,
            peer_window: None,
            ack_threshold_fraction,
            transactions: TransactionTable::new(),
            state: PublishState::Idle,
            stream_id: None,
            total_bytes_read: 0,
            bytes_read_since_last_ack: 0,
        }
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    /// Last 4 characters visible, everything before masked — the stream key
    /// must never appear in full in logs (§3).
    pub fn masked_stream_key(&self) -> String {
        mask_stream_key(&self.stream_key)
    }

    pub fn is_publishing(&self) -> bool {
        self.state == PublishState::Publishing
    }

    /// Window Acknowledgement threshold, derived from the peer's advertised
    /// window (§4.5). `None` until the peer has sent `WindowAckSize`.
    pub fn ack_threshold(&self) -> Option<u64> {
        self.peer_window
            .map(|w| (w as f64 * self.ack_threshold_fraction) as u64)
    }

    /// Records `n` bytes read from the peer. Returns `true` exactly when the
    /// accumulated delta has crossed the ack threshold, in which case the
    /// caller must emit an Acknowledgement and the delta counter resets.
    pub fn record_bytes_read(&mut self, n: usize) -> bool {
        self.total_bytes_read = self.total_bytes_read.wrapping_add(n as u64);
        self.bytes_read_since_last_ack += n as u64;

        match self.ack_threshold() {
            Some(threshold) if self.bytes_read_since_last_ack >= threshold => {
                self.bytes_read_since_last_ack = 0;
                true
            }
            _ => false,
        }
    }

    /// The 32-bit-wrapped cumulative byte count an Acknowledgement must
    /// carry at the moment it is emitted (§8).
    pub fn ack_sequence(&self) -> u32 {
        (self.total_bytes_read % (1u64 << 32)) as u32
    }
}

fn mask_stream_key(key: &str) -> String {
    let visible = 4.min(key.len());
    let (masked, tail) = key.split_at(key.len() - visible);
    format!("{}{}", "*".repeat(masked.len()), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "example.com".to_string(),
            port: 1935,
            app: "live".to_string(),
            tc_url: "rtmp://example.com/live".to_string(),
            use_tls: false,
        }
    }

    #[test]
    fn stream_key_is_masked_to_last_four_characters() {
        let session = Session::new(endpoint(), "XXXX-YYYY-ZZZZ-WWWW".to_string(), 0.6);
        assert_eq!(session.masked_stream_key(), "****************WWWW");
    }

    #[test]
    fn short_key_does_not_panic_on_masking() {
        let session = Session::new(endpoint(), "ab".to_string(), 0.6);
        assert_eq!(session.masked_stream_key(), "ab");
    }

    #[test]
    fn ack_threshold_is_none_until_peer_window_known() {
        let session = Session::new(endpoint(), "key".to_string(), 0.6);
        assert_eq!(session.ack_threshold(), None);
    }

    #[test]
    fn window_ack_accounting_matches_the_documented_scenario() {
        let mut session = Session::new(endpoint(), "key".to_string(), 0.6);
        session.peer_window = Some(2_500_000);
        assert_eq!(session.ack_threshold(), Some(1_500_000));

        assert!(!session.record_bytes_read(1_499_999));
        assert!(session.record_bytes_read(2));
        assert_eq!(session.ack_sequence(), 1_500_001);
    }
}
