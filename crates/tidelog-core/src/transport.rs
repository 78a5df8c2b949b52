//! Frame transport abstraction
//!
//! The [`FrameTransport`] trait is the only thing session loops know about
//! the connection they run on: it exchanges whole frames, either text
//! (structured headers and acknowledgments) or binary (payload buffers).
//!
//! ## Implementations
//!
//! - [`MockFrameTransport`](crate::MockFrameTransport): In-memory channel pair for testing
//! - `WsFrameTransport`: axum WebSocket binding (in tidelog-server crate)

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// One discrete message on a frame-oriented transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Structured (JSON) frame
    Text(String),
    /// Raw payload frame
    Binary(Bytes),
}

impl Frame {
    /// Short name of the frame kind, for errors and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
        }
    }

    /// Size of the frame body in bytes
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) => data.len(),
        }
    }

    /// Whether the frame body is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the text body, rejecting binary frames
    pub fn into_text(self) -> Result<String, TransportError> {
        match self {
            Frame::Text(text) => Ok(text),
            other => Err(TransportError::UnexpectedFrame {
                expected: "text",
                actual: other.kind(),
            }),
        }
    }

    /// Take the body as bytes; text frames are accepted as their UTF-8 bytes
    pub fn into_bytes(self) -> Bytes {
        match self {
            Frame::Text(text) => Bytes::from(text),
            Frame::Binary(data) => data,
        }
    }
}

/// Transport that exchanges whole frames with one remote party
///
/// A session owns its transport exclusively, so methods take `&mut self`.
/// Disconnects surface as [`TransportError::ConnectionClosed`] from either
/// primitive.
#[async_trait]
pub trait FrameTransport: Send {
    /// Send one frame
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Receive the next frame, waiting until one arrives
    async fn recv(&mut self) -> Result<Frame, TransportError>;

    /// Close the transport
    ///
    /// Default implementation does nothing.
    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
