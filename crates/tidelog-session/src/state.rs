//! Session lifecycle

use std::fmt;

/// Lifecycle of one session: `Connected -> Streaming -> Closed`
///
/// `Closed` is terminal; a session never reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Transport accepted, loop not started
    #[default]
    Connected,
    /// Loop running
    Streaming,
    /// Loop finished
    Closed,
}

impl SessionState {
    /// Whether the session has ended
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// Next state when the loop starts; a closed session stays closed
    pub fn start(self) -> Self {
        match self {
            SessionState::Connected | SessionState::Streaming => SessionState::Streaming,
            SessionState::Closed => SessionState::Closed,
        }
    }

    /// Next state when the loop ends
    pub fn close(self) -> Self {
        SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connected => "connected",
            SessionState::Streaming => "streaming",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Read or write cycles completed
    pub cycles: u64,
    /// Entries sent (pull) or stored (push)
    pub entries: u64,
    /// Bytes of payload sent or stored
    pub bytes: u64,
    /// Frames rejected with an error reply
    pub rejected: u64,
    /// Per-log read failures reported to a pull client
    pub log_errors: u64,
}
