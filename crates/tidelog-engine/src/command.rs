//! Closed command set
//!
//! Every operation a request/response caller may run against the engines
//! is one [`Command`] variant, decoded from JSON tagged by `cmd`:
//!
//! ```json
//! {"cmd": "READ", "cursors": [["cam", "0"]], "latest": true, "count": 1}
//! {"cmd": "ADD", "entries": [{"log": "cam", "payload": "hello"}]}
//! {"cmd": "REVRANGE", "log": "cam", "count": 5}
//! {"cmd": "LOGS"}
//! ```
//!
//! Replies are rendered with [`CommandReply`], which shows payloads as
//! (lossy) UTF-8 text.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tidelog_core::{
    AppendRequest, Entry, LogBatch, LogInfo, Metadata, Position, PositionError, PositionSpec,
    WritePosition,
};

use crate::error::{EngineError, EngineResult};

/// A request/response engine command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "UPPERCASE")]
pub enum Command {
    /// Read after a set of cursors
    Read {
        /// `[log, start]` pairs in delivery order
        cursors: Vec<(String, PositionSpec)>,
        #[serde(default)]
        latest: bool,
        #[serde(default)]
        count: Option<usize>,
        /// Milliseconds to wait for data; absent means do not wait
        #[serde(default)]
        block_ms: Option<u64>,
    },
    /// Append a batch atomically
    Add { entries: Vec<AddEntry> },
    /// Oldest-first range scan of one log
    Range(RangeArgs),
    /// Newest-first range scan of one log
    RevRange(RangeArgs),
    /// Length of one log
    Len { log: String },
    /// Summary of one log
    Info { log: String },
    /// List logs
    Logs,
    /// Delete logs
    Delete { logs: Vec<String> },
}

/// One entry of an `ADD` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEntry {
    pub log: String,
    #[serde(default)]
    pub position: WritePosition,
    pub payload: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl From<AddEntry> for AppendRequest {
    fn from(entry: AddEntry) -> Self {
        let metadata: Metadata = entry
            .metadata
            .into_iter()
            .map(|(key, value)| (key, Bytes::from(value)))
            .collect();
        AppendRequest::new(entry.log, entry.payload)
            .at(entry.position)
            .with_metadata(metadata)
    }
}

fn default_start() -> String {
    "-".to_string()
}

fn default_end() -> String {
    "+".to_string()
}

fn default_inclusive() -> bool {
    true
}

/// Arguments of `RANGE` and `REVRANGE`
///
/// `start` accepts `"-"` or `"0"` for the beginning of the log, `end`
/// accepts `"+"` for its end; both otherwise take `<millis>[-<seq>]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeArgs {
    pub log: String,
    #[serde(default = "default_start")]
    pub start: String,
    #[serde(default = "default_end")]
    pub end: String,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
}

impl RangeArgs {
    /// Range over a whole log
    pub fn all(log: impl Into<String>) -> Self {
        Self {
            log: log.into(),
            start: default_start(),
            end: default_end(),
            count: None,
            inclusive: true,
        }
    }

    /// Parsed lower edge
    pub fn start_position(&self) -> Result<Position, PositionError> {
        match self.start.trim() {
            "-" | "0" => Ok(Position::BEGINNING),
            other => other.parse(),
        }
    }

    /// Parsed upper edge
    pub fn end_position(&self) -> Result<Position, PositionError> {
        match self.end.trim() {
            "+" => Ok(Position::END),
            other => other.parse(),
        }
    }
}

/// An entry rendered for a JSON reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub position: Position,
    /// ISO-8601 time of the position's millisecond
    pub time: Option<String>,
    pub payload: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl From<&Entry> for EntryView {
    fn from(entry: &Entry) -> Self {
        Self {
            position: entry.position,
            time: entry.position.to_iso(),
            payload: String::from_utf8_lossy(&entry.payload).into_owned(),
            metadata: entry
                .metadata
                .iter()
                .map(|(key, value)| (key.clone(), String::from_utf8_lossy(value).into_owned()))
                .collect(),
        }
    }
}

/// A per-log batch element rendered for a JSON reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchView {
    pub log: String,
    pub entries: Vec<EntryView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&LogBatch> for BatchView {
    fn from(batch: &LogBatch) -> Self {
        Self {
            log: batch.log.clone(),
            entries: batch.entries.iter().map(EntryView::from).collect(),
            error: batch.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Log summary rendered for a JSON reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfoView {
    pub name: String,
    pub length: usize,
    pub first_entry: Option<EntryView>,
    pub last_entry: Option<EntryView>,
    pub last_generated: Position,
    pub max_deleted: Option<Position>,
    pub entries_added: u64,
}

impl From<&LogInfo> for InfoView {
    fn from(info: &LogInfo) -> Self {
        Self {
            name: info.name.clone(),
            length: info.length,
            first_entry: info.first_entry.as_ref().map(EntryView::from),
            last_entry: info.last_entry.as_ref().map(EntryView::from),
            last_generated: info.last_generated,
            max_deleted: info.max_deleted,
            entries_added: info.entries_added,
        }
    }
}

/// Result of executing a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum CommandReply {
    Read {
        batch: Vec<BatchView>,
        cursor: Vec<(String, Position)>,
    },
    Added {
        positions: Vec<Position>,
    },
    Range {
        batch: BatchView,
    },
    Len {
        log: String,
        length: usize,
    },
    Info {
        info: Option<InfoView>,
    },
    Logs {
        logs: Vec<String>,
    },
    Deleted {
        deleted: usize,
    },
}

/// Decode a command from JSON text
pub fn parse_command(text: &str) -> EngineResult<Command> {
    serde_json::from_str(text).map_err(|e| EngineError::InvalidCommand(e.to_string()))
}
