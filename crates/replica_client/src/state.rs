//! Session state and statistics.

/// Lifecycle of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Data has not been requested yet.
    Idle,
    /// Data was requested; events are being mirrored.
    Live,
    /// A fatal error ended the session.
    Terminated,
}

impl SessionState {
    /// Returns true if incoming events can still be applied.
    pub fn accepts_events(&self) -> bool {
        !matches!(self, SessionState::Terminated)
    }
}

/// Counters describing mirrored traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Messages applied successfully.
    pub messages_applied: u64,
    /// Mirror replicas created.
    pub replicas_created: u64,
    /// Mirror replicas destroyed.
    pub replicas_destroyed: u64,
    /// Write events replayed through a write lib.
    pub writes_replayed: u64,
    /// Payloads rejected without ending the session.
    pub messages_rejected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminated_sessions_refuse_events() {
        assert!(SessionState::Idle.accepts_events());
        assert!(SessionState::Live.accepts_events());
        assert!(!SessionState::Terminated.accepts_events());
    }
}
