//! Per-session cursor table
//!
//! A [`CursorTable`] maps each log a session reads to the last position it
//! has observed. It is created when the session starts, owned by that
//! session alone, and mutated only by [`CursorTable::advance`].

use tracing::trace;

use crate::entry::LogBatch;
use crate::position::{Position, PositionSpec};
use crate::traits::Clock;

/// How a session seeds its cursors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorSeed {
    /// Log names; every cursor starts at NOW
    Names(Vec<String>),
    /// Explicit starting position per log
    Positions(Vec<(String, PositionSpec)>),
}

impl From<Vec<String>> for CursorSeed {
    fn from(names: Vec<String>) -> Self {
        CursorSeed::Names(names)
    }
}

impl From<Vec<&str>> for CursorSeed {
    fn from(names: Vec<&str>) -> Self {
        CursorSeed::Names(names.into_iter().map(String::from).collect())
    }
}

impl From<Vec<(String, PositionSpec)>> for CursorSeed {
    fn from(positions: Vec<(String, PositionSpec)>) -> Self {
        CursorSeed::Positions(positions)
    }
}

impl From<Vec<(&str, PositionSpec)>> for CursorSeed {
    fn from(positions: Vec<(&str, PositionSpec)>) -> Self {
        CursorSeed::Positions(
            positions
                .into_iter()
                .map(|(log, spec)| (log.to_string(), spec))
                .collect(),
        )
    }
}

/// Ordered map of log name to current cursor position
///
/// Iteration follows the order in which logs were declared, which is also
/// the order of every read batch produced from this table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorTable {
    cursors: Vec<(String, Position)>,
}

impl CursorTable {
    /// Build a table, prefixing every log name and resolving NOW once
    ///
    /// All NOW cursors resolve to the same instant. Declaring a log twice
    /// keeps its first slot and the last position given.
    pub fn init<C: Clock>(seed: impl Into<CursorSeed>, prefix: &str, clock: &C) -> Self {
        let now = PositionSpec::Now.resolve(clock);
        let resolve = |spec: PositionSpec| match spec {
            PositionSpec::Now => now,
            other => other.resolve(clock),
        };

        let mut table = Self::default();
        match seed.into() {
            CursorSeed::Names(names) => {
                for name in names {
                    table.set(format!("{prefix}{name}"), now);
                }
            }
            CursorSeed::Positions(positions) => {
                for (name, spec) in positions {
                    table.set(format!("{prefix}{name}"), resolve(spec));
                }
            }
        }
        table
    }

    /// Build a table from already-resolved positions
    pub fn from_positions<I, S>(positions: I) -> Self
    where
        I: IntoIterator<Item = (S, Position)>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (log, position) in positions {
            table.set(log.into(), position);
        }
        table
    }

    fn set(&mut self, log: String, position: Position) {
        match self.cursors.iter_mut().find(|(name, _)| *name == log) {
            Some((_, slot)) => *slot = position,
            None => self.cursors.push((log, position)),
        }
    }

    /// Current cursor for a log
    pub fn get(&self, log: &str) -> Option<Position> {
        self.cursors
            .iter()
            .find(|(name, _)| name == log)
            .map(|(_, position)| *position)
    }

    /// Iterate `(log, position)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Position)> {
        self.cursors.iter().map(|(log, p)| (log.as_str(), *p))
    }

    /// Log names in declaration order
    pub fn logs(&self) -> impl Iterator<Item = &str> {
        self.cursors.iter().map(|(log, _)| log.as_str())
    }

    /// The cursors as a slice, for store calls
    pub fn as_slice(&self) -> &[(String, Position)] {
        &self.cursors
    }

    /// Number of logs tracked
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    /// Whether no logs are tracked
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Advance cursors past every entry in a read batch
    ///
    /// For each log with entries the cursor moves to the largest position
    /// seen, but never backwards. Logs with no entries, failed logs, and
    /// logs not tracked by this table are left alone. Returns how many
    /// cursors moved.
    pub fn advance(&mut self, batch: &[LogBatch]) -> usize {
        let mut moved = 0;
        for log_batch in batch {
            let Some(newest) = log_batch.max_position() else {
                continue;
            };
            let Some((_, cursor)) = self
                .cursors
                .iter_mut()
                .find(|(name, _)| *name == log_batch.log)
            else {
                continue;
            };
            if newest > *cursor {
                trace!(log = %log_batch.log, from = %cursor, to = %newest, "Advancing cursor");
                *cursor = newest;
                moved += 1;
            }
        }
        moved
    }
}
