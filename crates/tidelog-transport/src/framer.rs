//! Entry framer
//!
//! [`pack`] concatenates payloads into one buffer and records each entry's
//! cumulative end offset; [`unpack`] slices the buffer back apart. Entry `i`
//! spans `[end[i-1], end[i])` with an implicit start of 0, so headers never
//! carry start offsets. Equal consecutive offsets denote an empty payload:
//! an entry is present because it has a header row, never because its
//! payload is non-empty.

use std::fmt;

use bytes::{Bytes, BytesMut};
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tidelog_core::{FramingError, LogBatch, Position};

/// One header row: `[log, "ms-seq", end_offset]` on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub log: String,
    pub position: Position,
    /// Cumulative end offset of this entry's payload
    pub end: usize,
}

impl HeaderEntry {
    pub fn new(log: impl Into<String>, position: Position, end: usize) -> Self {
        Self {
            log: log.into(),
            position,
            end,
        }
    }
}

impl Serialize for HeaderEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut row = serializer.serialize_tuple(3)?;
        row.serialize_element(&self.log)?;
        row.serialize_element(&self.position)?;
        row.serialize_element(&self.end)?;
        row.end()
    }
}

impl<'de> Deserialize<'de> for HeaderEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = HeaderEntry;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a [log, position, end_offset] array")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<HeaderEntry, A::Error> {
                let log = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let position = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let end = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(2, &self))?;
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(4, &self));
                }
                Ok(HeaderEntry { log, position, end })
            }
        }

        deserializer.deserialize_tuple(3, RowVisitor)
    }
}

/// Ordered header rows describing one packed buffer
pub type FrameHeader = Vec<HeaderEntry>;

/// One entry recovered from a packed buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedEntry {
    pub log: String,
    pub position: Position,
    pub payload: Bytes,
}

impl FramedEntry {
    pub fn new(log: impl Into<String>, position: Position, payload: impl Into<Bytes>) -> Self {
        Self {
            log: log.into(),
            position,
            payload: payload.into(),
        }
    }
}

/// Pack a read batch in batch order
///
/// Metadata and per-log errors do not travel; failed logs contribute no
/// rows. An empty batch packs to an empty header and an empty buffer.
pub fn pack(batch: &[LogBatch]) -> (FrameHeader, Bytes) {
    let capacity = batch
        .iter()
        .flat_map(|b| b.entries.iter())
        .map(|e| e.payload.len())
        .sum();
    let mut buffer = BytesMut::with_capacity(capacity);
    let mut header = FrameHeader::new();

    for log_batch in batch {
        for entry in &log_batch.entries {
            buffer.extend_from_slice(&entry.payload);
            header.push(HeaderEntry::new(&log_batch.log, entry.position, buffer.len()));
        }
    }

    (header, buffer.freeze())
}

/// Slice a buffer at cumulative end offsets
///
/// Offsets must be non-decreasing, none may exceed the buffer, and the last
/// one must reach the end of the buffer so that no bytes go unaccounted.
pub fn slice_buffer(offsets: &[usize], buffer: &Bytes) -> Result<Vec<Bytes>, FramingError> {
    let len = buffer.len();
    let mut slices = Vec::with_capacity(offsets.len());
    let mut start = 0;

    for (index, &end) in offsets.iter().enumerate() {
        if end < start {
            return Err(FramingError::OffsetsDecreasing {
                index,
                previous: start,
                offset: end,
            });
        }
        if end > len {
            return Err(FramingError::OffsetOutOfBounds { offset: end, len });
        }
        slices.push(buffer.slice(start..end));
        start = end;
    }

    if start != len {
        return Err(FramingError::TrailingBytes {
            covered: start,
            len,
        });
    }
    Ok(slices)
}

/// Unpack a header and buffer into entries, in header order
pub fn unpack(header: &[HeaderEntry], buffer: &Bytes) -> Result<Vec<FramedEntry>, FramingError> {
    let offsets: Vec<usize> = header.iter().map(|row| row.end).collect();
    let slices = slice_buffer(&offsets, buffer)?;

    Ok(header
        .iter()
        .zip(slices)
        .map(|(row, payload)| FramedEntry::new(&row.log, row.position, payload))
        .collect())
}
