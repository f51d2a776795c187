/// Publish lifecycle (§3, transitions driven in §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    Connecting,
    Connected,
    Creating,
    CreatedPendingPublish,
    Publishing,
    Closing,
    Closed,
}

impl PublishState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PublishState::Closed)
    }
}
