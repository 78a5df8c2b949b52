//! Pull session loop
//!
//! Each cycle reads from the engine, packs the batch, and sends it as a
//! header frame followed by a buffer frame. Cycles are sent even when the
//! read timed out empty, so clients see an empty header as a heartbeat.
//! Optional pacing (`max_fps`) and a client acknowledgment between cycles
//! throttle delivery.
//!
//! A log whose read fails (for example a key that is not a log) is reported
//! with a `{"log": ..., "error": ...}` text frame ahead of the cycle's header.
//! The other logs keep streaming.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidelog_core::{Clock, CursorSeed, CursorTable, Frame, FrameTransport};
use tidelog_engine::{ReadEngine, ReadPolicy};
use tidelog_transport::{encode_header, encode_log_error, pack};
use tracing::{debug, info, instrument, warn};

use crate::error::{SessionError, SessionResult};
use crate::namespace::LogNamespace;
use crate::rate::{RateLimiter, period_for};
use crate::state::{SessionState, SessionStats};

/// Options for a pull session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullOptions {
    /// Skip to the newest entries instead of delivering everything
    pub latest: bool,
    /// Entries per log per cycle
    pub count: usize,
    /// How long one read may wait for data (`None` = indefinitely)
    pub block: Option<Duration>,
    /// Upper bound on cycles per second
    pub max_fps: Option<f64>,
    /// Wait for a client frame after every cycle
    pub ack: bool,
    /// Send the JSON header frame before each buffer
    pub header: bool,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            latest: false,
            count: 1,
            block: Some(Duration::from_millis(tidelog_engine::config::DEFAULT_BLOCK_MS)),
            max_fps: None,
            ack: false,
            header: true,
        }
    }
}

impl PullOptions {
    /// Read policy selected by these options
    pub fn policy(&self) -> ReadPolicy {
        ReadPolicy::from_latest(self.latest)
    }

    /// Check the options against the number of logs pulled
    pub fn validate(&self, logs: usize) -> SessionResult<()> {
        if self.count == 0 {
            return Err(SessionError::invalid_options("count must be at least 1"));
        }
        if logs == 0 {
            return Err(SessionError::invalid_options("at least one log is required"));
        }
        if let Some(fps) = self.max_fps.filter(|fps| period_for(*fps).is_err()) {
            return Err(SessionError::invalid_options(format!("max_fps {fps} is too small")));
        }
        if !self.header && (logs > 1 || self.count > 1) {
            return Err(SessionError::invalid_options(
                "header-less pulls need a single log and count 1",
            ));
        }
        Ok(())
    }
}

/// One pull session over a frame transport
pub struct PullSession<T, C> {
    transport: T,
    engine: ReadEngine,
    clock: C,
    namespace: LogNamespace,
    options: PullOptions,
    cursor: CursorTable,
    limiter: RateLimiter,
    state: SessionState,
    stats: SessionStats,
}

impl<T: FrameTransport, C: Clock> PullSession<T, C> {
    /// Create a session, resolving cursors against the clock immediately
    ///
    /// Log names in `seed` are client names; they are qualified through
    /// `namespace` before they reach the store.
    pub fn new(
        transport: T,
        engine: ReadEngine,
        clock: C,
        seed: impl Into<CursorSeed>,
        namespace: LogNamespace,
        options: PullOptions,
    ) -> SessionResult<Self> {
        let cursor = CursorTable::init(seed, &namespace.store_prefix(), &clock);
        options.validate(cursor.len())?;
        let limiter = RateLimiter::new(options.max_fps);

        Ok(Self {
            transport,
            engine,
            clock,
            namespace,
            options,
            cursor,
            limiter,
            state: SessionState::Connected,
            stats: SessionStats::default(),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current cursors
    pub fn cursor(&self) -> &CursorTable {
        &self.cursor
    }

    /// Run until the client disconnects or the store fails
    ///
    /// A disconnect ends the session cleanly; any other error ends it with
    /// that error.
    #[instrument(skip(self), fields(logs = self.cursor.len(), latest = self.options.latest))]
    pub async fn run(mut self) -> SessionResult<SessionStats> {
        self.state = self.state.start();
        debug!("Pull session started");

        let result = loop {
            if let Err(e) = self.cycle().await {
                break e;
            }
        };
        self.state = self.state.close();

        if result.is_disconnect() {
            info!(cycles = self.stats.cycles, entries = self.stats.entries, "Pull session closed");
            return Ok(self.stats);
        }
        warn!(error = %result, "Pull session failed");
        // Best effort; the session is already over
        let _ = self.transport.close().await;
        Err(result)
    }

    /// One read/send/pace/ack cycle
    pub async fn cycle(&mut self) -> SessionResult<()> {
        let batch = self
            .engine
            .read(
                &mut self.cursor,
                self.options.policy(),
                self.options.count,
                self.options.block,
            )
            .await?;

        for log_batch in &batch {
            if let Some(error) = &log_batch.error {
                let log = self.namespace.present(&log_batch.log);
                warn!(log = %log, error = %error, "Log read failed");
                self.stats.log_errors += 1;
                self.transport
                    .send(Frame::Text(encode_log_error(&log, error)))
                    .await?;
            }
        }

        let (mut header, buffer) = pack(&batch);
        for row in &mut header {
            row.log = self.namespace.present(&row.log);
        }
        self.stats.cycles += 1;
        self.stats.entries += header.len() as u64;
        self.stats.bytes += buffer.len() as u64;

        if self.options.header {
            self.transport.send(Frame::Text(encode_header(&header)?)).await?;
        }
        self.transport.send(Frame::Binary(buffer)).await?;

        self.limiter.pace(&self.clock).await;

        if self.options.ack {
            self.transport.recv().await?;
        }
        Ok(())
    }
}
