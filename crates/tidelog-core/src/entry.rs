//! Entries and read batches

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::StoreError;
use crate::position::{Position, WritePosition};

/// Auxiliary side fields stored alongside a payload
pub type Metadata = BTreeMap<String, Bytes>;

/// One payload appended to a log at a given position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Position within the owning log
    pub position: Position,
    /// Opaque payload
    pub payload: Bytes,
    /// Optional side map of auxiliary fields
    pub metadata: Metadata,
}

impl Entry {
    /// Create an entry without metadata
    pub fn new(position: Position, payload: impl Into<Bytes>) -> Self {
        Self {
            position,
            payload: payload.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The slice of a read result that belongs to one log
///
/// A failed per-log query keeps its place in the batch with `error` set, so
/// one bad log never discards the results of the others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBatch {
    /// Log name
    pub log: String,
    /// Entries in delivery order
    pub entries: Vec<Entry>,
    /// Per-log failure, if the store reported one
    pub error: Option<StoreError>,
}

impl LogBatch {
    /// Create a successful batch element
    pub fn new(log: impl Into<String>, entries: Vec<Entry>) -> Self {
        Self {
            log: log.into(),
            entries,
            error: None,
        }
    }

    /// Create an empty batch element
    pub fn empty(log: impl Into<String>) -> Self {
        Self::new(log, Vec::new())
    }

    /// Create a failed batch element
    pub fn failed(log: impl Into<String>, error: StoreError) -> Self {
        Self {
            log: log.into(),
            entries: Vec::new(),
            error: Some(error),
        }
    }

    /// Whether this element carries no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest position among the entries, regardless of their order
    pub fn max_position(&self) -> Option<Position> {
        self.entries.iter().map(|e| e.position).max()
    }
}

/// Ordered per-log results of one read call
pub type ReadBatch = Vec<LogBatch>;

/// Total number of entries across a batch
pub fn batch_len(batch: &[LogBatch]) -> usize {
    batch.iter().map(|b| b.entries.len()).sum()
}

/// Whether no log in the batch produced an entry
pub fn batch_is_empty(batch: &[LogBatch]) -> bool {
    batch.iter().all(LogBatch::is_empty)
}

/// One entry to append as part of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendRequest {
    /// Target log
    pub log: String,
    /// Requested position
    pub position: WritePosition,
    /// Opaque payload
    pub payload: Bytes,
    /// Auxiliary fields
    pub metadata: Metadata,
}

impl AppendRequest {
    /// Append with an auto-assigned position
    pub fn new(log: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            log: log.into(),
            position: WritePosition::Auto,
            payload: payload.into(),
            metadata: Metadata::new(),
        }
    }

    /// Request an explicit position
    pub fn at(mut self, position: impl Into<WritePosition>) -> Self {
        self.position = position.into();
        self
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}
