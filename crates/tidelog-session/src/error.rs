//! Error types for session loops

use thiserror::Error;
use tidelog_core::{FramingError, TransportError};
use tidelog_engine::EngineError;

/// Errors that can end or reject a session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Engine or store failure
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Transport failure, including disconnects
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed frame
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// Options that cannot be honored
    #[error("Invalid session options: {0}")]
    InvalidOptions(String),
}

impl SessionError {
    /// Create a new InvalidOptions error
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }

    /// Whether the remote side went away
    pub fn is_disconnect(&self) -> bool {
        matches!(self, SessionError::Transport(e) if e.is_disconnect())
    }

    /// Whether the session cannot continue
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Engine(e) => e.is_fatal(),
            SessionError::Transport(_) => true,
            SessionError::Framing(_) | SessionError::InvalidOptions(_) => false,
        }
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
