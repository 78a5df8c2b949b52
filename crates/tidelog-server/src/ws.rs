//! Frame transport over an axum WebSocket

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use tidelog_core::{Frame, FrameTransport, TransportError};
use tracing::trace;

/// Adapts a WebSocket to whole-frame send/receive
///
/// Ping and pong messages are answered by axum and skipped here; a close
/// message or the end of the stream reads as a disconnect.
pub struct WsFrameTransport {
    socket: WebSocket,
}

impl WsFrameTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl FrameTransport for WsFrameTransport {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        self.socket
            .send(message)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        loop {
            let message = match self.socket.recv().await {
                None => return Err(TransportError::ConnectionClosed),
                Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                Some(Ok(message)) => message,
            };
            match message {
                Message::Text(text) => return Ok(Frame::Text(text.as_str().to_owned())),
                Message::Binary(bytes) => return Ok(Frame::Binary(bytes)),
                Message::Close(frame) => {
                    trace!(?frame, "Peer closed WebSocket");
                    return Err(TransportError::ConnectionClosed);
                }
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.socket
            .send(Message::Close(None))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}
