//! Core traits for the Tidelog stack
//!
//! - [`LogStore`]: The external multi-log store the engines run against
//! - [`Clock`]: Time abstraction for testability

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{AppendRequest, Entry, LogBatch, ReadBatch};
use crate::error::StoreError;
use crate::position::Position;

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;

    /// Sleep for a duration (async)
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually driven clock for tests
///
/// `sleep` returns immediately, advances the clock by the requested amount,
/// and records the duration so tests can assert on pacing.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualClockState>>,
}

#[derive(Debug)]
struct ManualClockState {
    base: Instant,
    elapsed: Duration,
    utc_millis: i64,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    /// Create a clock whose UTC time starts at the given epoch milliseconds
    pub fn from_millis(utc_millis: i64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualClockState {
                base: Instant::now(),
                elapsed: Duration::ZERO,
                utc_millis,
                sleeps: Vec::new(),
            })),
        }
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        state.elapsed += duration;
    }

    /// Durations passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.lock().sleeps.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let state = self.lock();
        state.base + state.elapsed
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let state = self.lock();
        let millis = state.utc_millis + state.elapsed.as_millis() as i64;
        DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }

    async fn sleep(&self, duration: Duration) {
        let mut state = self.lock();
        state.sleeps.push(duration);
        state.elapsed += duration;
    }
}

/// Lower or upper bound of a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    /// Include entries at exactly this position
    Inclusive(Position),
    /// Exclude entries at exactly this position
    Exclusive(Position),
}

impl Bound {
    /// Lower bound for "entries after this cursor"
    ///
    /// Cursors are exclusive except BEGINNING, which has nothing before it
    /// to exclude.
    pub fn after(cursor: Position) -> Self {
        if cursor.is_beginning() {
            Bound::Inclusive(cursor)
        } else {
            Bound::Exclusive(cursor)
        }
    }

    /// Lower bound honoring an explicit inclusive flag
    pub fn lower(start: Position, inclusive: bool) -> Self {
        if inclusive {
            Bound::Inclusive(start)
        } else {
            Self::after(start)
        }
    }

    /// The position this bound refers to
    pub fn position(&self) -> Position {
        match self {
            Bound::Inclusive(p) | Bound::Exclusive(p) => *p,
        }
    }

    /// Whether `position` satisfies this bound used as a lower bound
    pub fn admits_from_below(&self, position: Position) -> bool {
        match self {
            Bound::Inclusive(start) => position >= *start,
            Bound::Exclusive(start) => position > *start,
        }
    }

    /// Whether `position` satisfies this bound used as an upper bound
    pub fn admits_from_above(&self, position: Position) -> bool {
        match self {
            Bound::Inclusive(end) => position <= *end,
            Bound::Exclusive(end) => position < *end,
        }
    }
}

/// One per-log range query inside a batched range call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    /// Target log
    pub log: String,
    /// Lower bound
    pub start: Bound,
    /// Upper bound
    pub end: Bound,
    /// Maximum entries to return (`None` = unbounded)
    pub count: Option<usize>,
}

impl RangeQuery {
    /// Query for entries strictly after a cursor, up to the end of the log
    pub fn after(log: impl Into<String>, cursor: Position, count: usize) -> Self {
        Self {
            log: log.into(),
            start: Bound::after(cursor),
            end: Bound::Inclusive(Position::END),
            count: Some(count),
        }
    }

    /// Whether a position falls inside this query's bounds
    pub fn contains(&self, position: Position) -> bool {
        self.start.admits_from_below(position) && self.end.admits_from_above(position)
    }
}

/// Approximate max-length trimming requested with an append
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimPolicy {
    /// Target number of entries to keep
    pub max_len: usize,
    /// Allow the store to keep more than `max_len` to avoid trimming on every write
    pub approximate: bool,
}

impl TrimPolicy {
    /// Approximate trim to `max_len`
    pub fn approximate(max_len: usize) -> Self {
        Self {
            max_len,
            approximate: true,
        }
    }

    /// Exact trim to `max_len`
    pub fn exact(max_len: usize) -> Self {
        Self {
            max_len,
            approximate: false,
        }
    }
}

/// Summary of one log, as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogInfo {
    /// Log name
    pub name: String,
    /// Number of entries currently held
    pub length: usize,
    /// Oldest retained entry
    pub first_entry: Option<Entry>,
    /// Newest entry
    pub last_entry: Option<Entry>,
    /// Last position ever assigned (survives trimming)
    pub last_generated: Position,
    /// Largest position removed by trimming
    pub max_deleted: Option<Position>,
    /// Entries ever appended
    pub entries_added: u64,
}

/// Multi-log append-only store
///
/// Implementations provide their own atomicity: one call is one pipeline.
/// Engines never hold locks of their own; concurrent sessions reading or
/// writing the same log rely entirely on the store.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Atomic multi-log read of up to `count` entries after each cursor
    ///
    /// Returns one [`LogBatch`] per cursor in request order. Waits up to
    /// `block` for any log to produce data: `None` waits indefinitely,
    /// `Some(Duration::ZERO)` does not wait. Logs that do not exist yield
    /// empty batches.
    async fn read_after(
        &self,
        cursors: &[(String, Position)],
        count: usize,
        block: Option<Duration>,
    ) -> Result<ReadBatch, StoreError>;

    /// Batched, non-blocking per-log range queries in one round trip
    ///
    /// With `reverse` the newest entries come first. Failures of a single
    /// query are attached to its batch element.
    async fn range_batch(
        &self,
        queries: &[RangeQuery],
        reverse: bool,
    ) -> Result<Vec<LogBatch>, StoreError>;

    /// Append every request as one all-or-nothing pipeline
    async fn append_batch(
        &self,
        requests: &[AppendRequest],
        trim: Option<TrimPolicy>,
    ) -> Result<Vec<Position>, StoreError>;

    /// Number of entries in a log (0 if it does not exist)
    async fn len(&self, log: &str) -> Result<usize, StoreError>;

    /// Summary of a log, `None` if it does not exist
    async fn info(&self, log: &str) -> Result<Option<LogInfo>, StoreError>;

    /// Names of all existing logs, sorted
    async fn logs(&self) -> Result<Vec<String>, StoreError>;

    /// Remove logs entirely, returning how many existed
    async fn delete(&self, logs: &[String]) -> Result<usize, StoreError>;
}

/// Shared handle to a store, passed explicitly into every engine
pub type SharedStore = Arc<dyn LogStore>;
