//! Error types for Tidelog

use thiserror::Error;

use crate::position::Position;

/// Top-level error type for Tidelog
#[derive(Debug, Error)]
pub enum TidelogError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),
}

/// Errors reported by a log store
///
/// Per-log variants (`WrongType`, `UnknownLog`, ...) are attached to the
/// matching [`LogBatch`](crate::LogBatch) on reads. `Unavailable` means the
/// whole call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown or invalid log: {0:?}")]
    UnknownLog(String),

    #[error("Key {0:?} holds a value that is not a log")]
    WrongType(String),

    #[error("Position {position} for log {log:?} must be greater than 0-0")]
    ZeroPosition { log: String, position: Position },

    #[error("Position {position} for log {log:?} is not greater than the last position {last}")]
    PositionNotIncreasing {
        log: String,
        position: Position,
        last: Position,
    },
}

impl StoreError {
    /// Create a new Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Whether this error ends a session rather than a single request
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Errors raised while packing or unpacking a frame batch
///
/// These are local to one pack/unpack call; the session that received the
/// frame keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("Header declares {logs} logs but {offsets} offsets")]
    CountMismatch { logs: usize, offsets: usize },

    #[error("Offset {offset} at index {index} is smaller than the previous offset {previous}")]
    OffsetsDecreasing {
        index: usize,
        previous: usize,
        offset: usize,
    },

    #[error("Offset {offset} is past the end of a {len}-byte buffer")]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("Buffer has {len} bytes but the header only covers {covered}")]
    TrailingBytes { covered: usize, len: usize },

    #[error("Whole-buffer push needs exactly one declared log, got {0}")]
    AmbiguousLogs(usize),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Header could not be encoded: {0}")]
    Encode(String),
}

/// Errors related to frame transports
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Unexpected frame: expected {expected}, got {actual}")]
    UnexpectedFrame {
        expected: &'static str,
        actual: &'static str,
    },
}

impl TransportError {
    /// Whether the peer went away (the session should close cleanly)
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionClosed
                | TransportError::SendFailed(_)
                | TransportError::ReceiveFailed(_)
        )
    }
}

/// Errors related to position parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("Invalid position {0:?}: expected <millis>-<seq>")]
    InvalidFormat(String),

    #[error("Auto position {0:?} is only valid for writes")]
    AutoNotAllowed(String),
}

/// Result type alias for Tidelog operations
pub type TidelogResult<T> = Result<T, TidelogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::unavailable("connection refused");
        assert!(format!("{}", err).contains("connection refused"));
        assert!(err.is_fatal());

        let err = StoreError::WrongType("config".to_string());
        assert!(format!("{}", err).contains("config"));
        assert!(!err.is_fatal());

        let err = StoreError::PositionNotIncreasing {
            log: "cam".to_string(),
            position: Position::new(5, 0),
            last: Position::new(7, 1),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("5-0"));
        assert!(msg.contains("7-1"));
    }

    #[test]
    fn test_framing_error_display() {
        let err = FramingError::CountMismatch {
            logs: 3,
            offsets: 2,
        };
        let msg = format!("{}", err);
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));

        let err = FramingError::OffsetOutOfBounds { offset: 20, len: 12 };
        assert!(format!("{}", err).contains("12-byte"));
    }

    #[test]
    fn test_transport_error_disconnect() {
        assert!(TransportError::ConnectionClosed.is_disconnect());
        assert!(TransportError::SendFailed("broken pipe".into()).is_disconnect());
        assert!(
            !TransportError::UnexpectedFrame {
                expected: "text",
                actual: "binary"
            }
            .is_disconnect()
        );
    }

    #[test]
    fn test_error_conversions() {
        let err: TidelogError = StoreError::unavailable("down").into();
        assert!(matches!(err, TidelogError::Store(_)));

        let err: TidelogError = FramingError::AmbiguousLogs(2).into();
        assert!(matches!(err, TidelogError::Framing(_)));

        let err: TidelogError = TransportError::ConnectionClosed.into();
        assert!(matches!(err, TidelogError::Transport(_)));

        let err: TidelogError = PositionError::InvalidFormat("x".into()).into();
        assert!(format!("{}", err).contains("Position error"));
    }
}
