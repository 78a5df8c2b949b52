//! Pull/push wire headers, acknowledgments and error replies
//!
//! Pull sessions send a [`FrameHeader`] as JSON. Push clients may describe
//! their buffer in any of four shapes:
//!
//! | Header | Meaning |
//! |---|---|
//! | `[]` | whole buffer is one entry for the sole declared log |
//! | `[o1, o2, ...]` | end offsets, one per declared log, in order |
//! | `[[log, o], ...]` | end offsets with explicit log names |
//! | `[[log, position, o], ...]` | as above with a position (`null` or `"*"` = auto) |

use bytes::Bytes;
use serde_json::Value;
use tidelog_core::{AppendRequest, FramingError, Position, WritePosition};
use tracing::trace;

use crate::framer::{FrameHeader, slice_buffer};

/// Encode a pull header frame
pub fn encode_header(header: &FrameHeader) -> Result<String, FramingError> {
    serde_json::to_string(header).map_err(|e| FramingError::Encode(e.to_string()))
}

/// Decode a pull header frame
pub fn decode_header(text: &str) -> Result<FrameHeader, FramingError> {
    serde_json::from_str(text).map_err(|e| FramingError::InvalidHeader(e.to_string()))
}

/// Encode the acknowledgment sent after a push is stored
pub fn encode_ack(positions: &[Position]) -> String {
    Value::Array(
        positions
            .iter()
            .map(|p| Value::String(p.to_string()))
            .collect(),
    )
    .to_string()
}

/// Encode the reply sent when a push is rejected
pub fn encode_error(error: &impl std::fmt::Display) -> String {
    serde_json::json!({ "error": error.to_string() }).to_string()
}

/// Encode the frame reporting a per-log read failure to a pull client
pub fn encode_log_error(log: &str, error: &impl std::fmt::Display) -> String {
    serde_json::json!({ "log": log, "error": error.to_string() }).to_string()
}

/// One explicitly addressed push row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    pub log: String,
    pub position: WritePosition,
    pub end: usize,
}

/// Decoded push header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushHeader {
    /// `[]`: the whole buffer is one entry
    WholeBuffer,
    /// `[o1, o2, ...]`: one offset per declared log
    Offsets(Vec<usize>),
    /// `[[log, (position,) offset], ...]`
    Targets(Vec<PushTarget>),
}

/// Parse a push header frame
pub fn parse_push_header(text: &str) -> Result<PushHeader, FramingError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| FramingError::InvalidHeader(e.to_string()))?;
    let Value::Array(rows) = value else {
        return Err(FramingError::InvalidHeader("expected a JSON array".into()));
    };

    match rows.first() {
        None => Ok(PushHeader::WholeBuffer),
        Some(Value::Array(_)) => rows
            .iter()
            .map(parse_target)
            .collect::<Result<Vec<_>, _>>()
            .map(PushHeader::Targets),
        Some(_) => rows
            .iter()
            .map(parse_offset)
            .collect::<Result<Vec<_>, _>>()
            .map(PushHeader::Offsets),
    }
}

fn parse_offset(value: &Value) -> Result<usize, FramingError> {
    value
        .as_u64()
        .map(|offset| offset as usize)
        .ok_or_else(|| FramingError::InvalidHeader(format!("invalid offset {value}")))
}

fn parse_target(value: &Value) -> Result<PushTarget, FramingError> {
    let invalid = || FramingError::InvalidHeader(format!("invalid row {value}"));
    let row = value.as_array().ok_or_else(invalid)?;

    let (log, position, offset) = match row.as_slice() {
        [log, offset] => (log, None, offset),
        [log, position, offset] => (log, Some(position), offset),
        _ => return Err(invalid()),
    };
    let log = log.as_str().ok_or_else(invalid)?.to_string();
    let position = match position {
        None | Some(Value::Null) => WritePosition::Auto,
        Some(Value::String(text)) => text
            .parse()
            .map_err(|e: tidelog_core::PositionError| FramingError::InvalidHeader(e.to_string()))?,
        Some(_) => return Err(invalid()),
    };
    let end = parse_offset(offset)?;
    Ok(PushTarget { log, position, end })
}

impl PushHeader {
    /// Number of entries this header describes, given the declared logs
    pub fn entry_count(&self) -> usize {
        match self {
            PushHeader::WholeBuffer => 1,
            PushHeader::Offsets(offsets) => offsets.len(),
            PushHeader::Targets(targets) => targets.len(),
        }
    }

    /// Turn a header and its buffer into append requests
    ///
    /// `declared` are the logs named by the session; they address the
    /// whole-buffer and bare-offset forms. Log names in addressed rows are
    /// used as given.
    pub fn into_requests(
        self,
        declared: &[String],
        buffer: Bytes,
    ) -> Result<Vec<AppendRequest>, FramingError> {
        let requests = match self {
            PushHeader::WholeBuffer => match declared {
                [log] => vec![AppendRequest::new(log.clone(), buffer)],
                _ => return Err(FramingError::AmbiguousLogs(declared.len())),
            },
            PushHeader::Offsets(offsets) => {
                if offsets.len() != declared.len() {
                    return Err(FramingError::CountMismatch {
                        logs: declared.len(),
                        offsets: offsets.len(),
                    });
                }
                let slices = slice_buffer(&offsets, &buffer)?;
                declared
                    .iter()
                    .zip(slices)
                    .map(|(log, payload)| AppendRequest::new(log.clone(), payload))
                    .collect()
            }
            PushHeader::Targets(targets) => {
                let offsets: Vec<usize> = targets.iter().map(|t| t.end).collect();
                let slices = slice_buffer(&offsets, &buffer)?;
                targets
                    .into_iter()
                    .zip(slices)
                    .map(|(target, payload)| {
                        AppendRequest::new(target.log, payload).at(target.position)
                    })
                    .collect()
            }
        };
        trace!(entries = requests.len(), "Decoded push frame");
        Ok(requests)
    }
}
