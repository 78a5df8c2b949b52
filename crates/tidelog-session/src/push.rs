//! Push session loop
//!
//! Each cycle receives a header frame (unless header-less), then a buffer
//! frame, turns them into append requests and stores them as one batch.
//! Malformed frames and rejected writes are answered with an error frame
//! and the session keeps going; a store outage or a disconnect ends it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tidelog_core::{Frame, FrameTransport, TransportError};
use tidelog_engine::WriteEngine;
use tidelog_transport::{PushHeader, encode_ack, encode_error, parse_push_header};
use tracing::{debug, info, instrument, warn};

use crate::error::{SessionError, SessionResult};
use crate::namespace::LogNamespace;
use crate::state::{SessionState, SessionStats};

/// Options for a push session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushOptions {
    /// Reply with the assigned positions after every stored batch
    pub ack: bool,
    /// Expect a JSON header frame before each buffer
    pub header: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            ack: false,
            header: true,
        }
    }
}

impl PushOptions {
    /// Check the options against the number of declared logs
    pub fn validate(&self, logs: usize) -> SessionResult<()> {
        if !self.header && logs != 1 {
            return Err(SessionError::invalid_options(
                "header-less pushes need exactly one log",
            ));
        }
        Ok(())
    }
}

/// One push session over a frame transport
pub struct PushSession<T> {
    transport: T,
    engine: WriteEngine,
    /// Client log names from the session address
    declared: Vec<String>,
    namespace: LogNamespace,
    options: PushOptions,
    state: SessionState,
    stats: SessionStats,
}

impl<T: FrameTransport> PushSession<T> {
    /// Create a session for the declared client log names
    pub fn new(
        transport: T,
        engine: WriteEngine,
        declared: Vec<String>,
        namespace: LogNamespace,
        options: PushOptions,
    ) -> SessionResult<Self> {
        options.validate(declared.len())?;
        Ok(Self {
            transport,
            engine,
            declared,
            namespace,
            options,
            state: SessionState::Connected,
            stats: SessionStats::default(),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run until the client disconnects or the store fails
    #[instrument(skip(self), fields(logs = self.declared.len()))]
    pub async fn run(mut self) -> SessionResult<SessionStats> {
        self.state = self.state.start();
        debug!("Push session started");

        let result = loop {
            if let Err(e) = self.cycle().await {
                break e;
            }
        };
        self.state = self.state.close();

        if result.is_disconnect() {
            info!(
                cycles = self.stats.cycles,
                entries = self.stats.entries,
                rejected = self.stats.rejected,
                "Push session closed"
            );
            return Ok(self.stats);
        }
        warn!(error = %result, "Push session failed");
        let _ = self.transport.close().await;
        Err(result)
    }

    /// Receive, store and acknowledge one batch
    ///
    /// Returns an error only when the session must end.
    pub async fn cycle(&mut self) -> SessionResult<()> {
        let header = if self.options.header {
            match self.transport.recv().await? {
                Frame::Text(text) => Some(text),
                other => {
                    let err = TransportError::UnexpectedFrame {
                        expected: "text",
                        actual: other.kind(),
                    };
                    return self.reject(&err).await;
                }
            }
        } else {
            None
        };
        let buffer = self.transport.recv().await?.into_bytes();

        match self.store(header.as_deref(), buffer).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => self.reject(&e).await,
        }
    }

    async fn store(&mut self, header: Option<&str>, buffer: Bytes) -> SessionResult<()> {
        let parsed = match header {
            Some(text) => parse_push_header(text)?,
            None => PushHeader::WholeBuffer,
        };
        let mut requests = parsed.into_requests(&self.declared, buffer)?;
        for request in &mut requests {
            request.log = self.namespace.qualify(&request.log);
        }

        let positions = self.engine.append_batch(&requests).await?;
        self.stats.cycles += 1;
        self.stats.entries += positions.len() as u64;
        self.stats.bytes += requests.iter().map(|r| r.payload.len() as u64).sum::<u64>();

        if self.options.ack {
            self.transport.send(Frame::Text(encode_ack(&positions))).await?;
        }
        Ok(())
    }

    async fn reject(&mut self, error: &(impl std::fmt::Display + Sync)) -> SessionResult<()> {
        debug!(%error, "Rejected push frame");
        self.stats.rejected += 1;
        self.transport.send(Frame::Text(encode_error(error))).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_less_needs_one_log() {
        let options = PushOptions {
            header: false,
            ..PushOptions::default()
        };
        assert!(options.validate(1).is_ok());
        assert!(options.validate(2).is_err());
        assert!(PushOptions::default().validate(3).is_ok());
    }
}
