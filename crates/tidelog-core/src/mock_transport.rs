//! Mock frame transport for testing
//!
//! Provides an in-memory transport for exercising session loops without a
//! real connection.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tidelog_core::{Frame, FrameTransport, MockFrameTransport};
//!
//! let (mut server, mut client) = MockFrameTransport::pair();
//!
//! server.send(Frame::Text("[]".into())).await.unwrap();
//! assert_eq!(client.recv().await.unwrap(), Frame::Text("[]".into()));
//!
//! // Dropping one end disconnects the other
//! drop(client);
//! assert!(server.recv().await.is_err());
//! ```

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::{Frame, FrameTransport};

/// One end of an in-memory frame channel pair
#[derive(Debug)]
pub struct MockFrameTransport {
    /// Frames we send to the other end
    outgoing: Option<mpsc::Sender<Frame>>,
    /// Frames the other end sent us
    incoming: mpsc::Receiver<Frame>,
    /// Frames sent so far
    sent: usize,
}

impl MockFrameTransport {
    /// Create a connected pair with the default buffer size
    pub fn pair() -> (Self, Self) {
        MockTransportBuilder::new().create_pair()
    }

    /// Number of frames sent through this end
    pub fn sent_count(&self) -> usize {
        self.sent
    }

    /// Whether a frame is waiting to be received, without consuming it
    pub fn try_recv(&mut self) -> Result<Option<Frame>, TransportError> {
        match self.incoming.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(TransportError::ConnectionClosed),
        }
    }
}

#[async_trait]
impl FrameTransport for MockFrameTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let sender = self
            .outgoing
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?;

        sender
            .send(frame)
            .await
            .map_err(|_: mpsc::error::SendError<Frame>| TransportError::ConnectionClosed)?;

        self.sent += 1;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        self.incoming
            .recv()
            .await
            .ok_or(TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outgoing = None;
        self.incoming.close();
        Ok(())
    }
}

/// Builder for creating connected mock transport pairs
pub struct MockTransportBuilder {
    buffer_size: usize,
}

impl Default for MockTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransportBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self { buffer_size: 1024 }
    }

    /// Set the buffer size for channels
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Create two transports wired to each other
    pub fn create_pair(&self) -> (MockFrameTransport, MockFrameTransport) {
        let (a_tx, a_rx) = mpsc::channel(self.buffer_size);
        let (b_tx, b_rx) = mpsc::channel(self.buffer_size);

        let a = MockFrameTransport {
            outgoing: Some(b_tx),
            incoming: a_rx,
            sent: 0,
        };
        let b = MockFrameTransport {
            outgoing: Some(a_tx),
            incoming: b_rx,
            sent: 0,
        };
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_pair_exchanges_frames_in_order() {
        let (mut a, mut b) = MockFrameTransport::pair();

        a.send(Frame::Text("header".into())).await.unwrap();
        a.send(Frame::Binary(Bytes::from_static(b"body"))).await.unwrap();

        assert_eq!(b.recv().await.unwrap(), Frame::Text("header".into()));
        assert_eq!(
            b.recv().await.unwrap(),
            Frame::Binary(Bytes::from_static(b"body"))
        );
        assert_eq!(a.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_drop_disconnects_peer() {
        let (mut a, b) = MockFrameTransport::pair();
        drop(b);

        assert_eq!(a.recv().await.unwrap_err(), TransportError::ConnectionClosed);
        assert_eq!(
            a.send(Frame::Text("x".into())).await.unwrap_err(),
            TransportError::ConnectionClosed
        );
    }

    #[tokio::test]
    async fn test_close_disconnects_both_directions() {
        let (mut a, mut b) = MockFrameTransport::pair();
        a.close().await.unwrap();

        assert_eq!(b.recv().await.unwrap_err(), TransportError::ConnectionClosed);
        assert!(a.send(Frame::Text("x".into())).await.is_err());
    }

    #[tokio::test]
    async fn test_try_recv() {
        let (mut a, mut b) = MockTransportBuilder::new().buffer_size(4).create_pair();
        assert_eq!(b.try_recv().unwrap(), None);
        a.send(Frame::Text("ping".into())).await.unwrap();
        assert_eq!(b.try_recv().unwrap(), Some(Frame::Text("ping".into())));
    }
}
