//! Error types for the read and write engines

use thiserror::Error;
use tidelog_core::{PositionError, StoreError};

/// Errors that can occur in engine operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The store rejected or failed the call
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A position argument could not be parsed
    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    /// A command could not be decoded
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// A caller argument is out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store answered with a different number of results than requested
    #[error("Store returned {actual} results for {expected} requests")]
    ResultCountMismatch { expected: usize, actual: usize },
}

impl EngineError {
    /// Create a new InvalidArgument error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether this error ends the calling session
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Store(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_fatal() {
        assert!(EngineError::from(StoreError::unavailable("down")).is_fatal());
        assert!(!EngineError::from(StoreError::WrongType("x".into())).is_fatal());
        assert!(!EngineError::invalid("count must be at least 1").is_fatal());
    }
}
