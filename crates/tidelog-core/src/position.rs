//! Position codec
//!
//! A [`Position`] is the `(millis, seq)` token that totally orders entries
//! inside one log. Its text form is `"<millis>-<seq>"`.
//!
//! Callers address positions through two spec types:
//!
//! - [`PositionSpec`] for reads: `"$"` (now), `"0"` / `"-"` (beginning), or an
//!   explicit position
//! - [`WritePosition`] for appends: `"*"` (auto) or an explicit position

use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PositionError;
use crate::traits::Clock;

/// Totally ordered token identifying an entry within one log
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    /// Millisecond wall-clock timestamp
    pub millis: u64,
    /// Tie-break sequence within the millisecond
    pub seq: u64,
}

impl Position {
    /// The minimum token; sorts before every entry
    pub const BEGINNING: Position = Position { millis: 0, seq: 0 };

    /// The maximum token; sorts after every entry
    pub const END: Position = Position {
        millis: u64::MAX,
        seq: u64::MAX,
    };

    /// Create a new position
    pub const fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    /// Map wall-clock seconds to `(floor(seconds * 1000), 0)`
    pub fn from_timestamp(seconds: f64) -> Self {
        let millis = (seconds * 1000.0).floor();
        if millis.is_finite() && millis > 0.0 {
            Self::new(millis as u64, 0)
        } else {
            Self::BEGINNING
        }
    }

    /// Wall-clock seconds for this position, dropping the sequence
    pub fn to_timestamp(&self) -> f64 {
        self.millis as f64 / 1000.0
    }

    /// Position at the start of the given instant's millisecond
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::new(dt.timestamp_millis().max(0) as u64, 0)
    }

    /// Datetime of this position's millisecond
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.millis)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }

    /// ISO-8601 rendering of the position's timestamp
    pub fn to_iso(&self) -> Option<String> {
        self.to_datetime().map(|dt| dt.to_rfc3339())
    }

    /// Whether this is the BEGINNING sentinel
    pub fn is_beginning(&self) -> bool {
        *self == Self::BEGINNING
    }

    /// The smallest position strictly greater than this one
    pub fn successor(&self) -> Option<Position> {
        match self.seq.checked_add(1) {
            Some(seq) => Some(Self::new(self.millis, seq)),
            None => self.millis.checked_add(1).map(|millis| Self::new(millis, 0)),
        }
    }
}

/// Map wall-clock seconds to a position
pub fn to_position(seconds: f64) -> Position {
    Position::from_timestamp(seconds)
}

/// Map a position back to wall-clock seconds
pub fn to_timestamp(position: Position) -> f64 {
    position.to_timestamp()
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for Position {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PositionError::InvalidFormat(s.to_string());
        let (millis, seq) = match s.split_once('-') {
            Some((millis, seq)) => (millis, seq),
            None => (s, "0"),
        };
        let millis = millis.trim().parse::<u64>().map_err(|_| invalid())?;
        let seq = seq.trim().parse::<u64>().map_err(|_| invalid())?;
        Ok(Self::new(millis, seq))
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Starting position requested for a read cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PositionSpec {
    /// Before every entry (`"0"` or `"-"`)
    Beginning,
    /// After every entry present when the session starts (`"$"`)
    #[default]
    Now,
    /// After an explicit position
    At(Position),
}

impl PositionSpec {
    /// Resolve to a concrete position
    ///
    /// `Now` is resolved against the clock at the moment of the call and is
    /// never re-resolved afterwards.
    pub fn resolve<C: Clock>(&self, clock: &C) -> Position {
        match self {
            PositionSpec::Beginning => Position::BEGINNING,
            PositionSpec::Now => Position::from_datetime(clock.now_utc()),
            PositionSpec::At(position) => *position,
        }
    }
}

impl From<Position> for PositionSpec {
    fn from(position: Position) -> Self {
        PositionSpec::At(position)
    }
}

impl Display for PositionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSpec::Beginning => write!(f, "0"),
            PositionSpec::Now => write!(f, "$"),
            PositionSpec::At(position) => write!(f, "{}", position),
        }
    }
}

impl FromStr for PositionSpec {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "$" => Ok(PositionSpec::Now),
            "0" | "-" => Ok(PositionSpec::Beginning),
            "*" => Err(PositionError::AutoNotAllowed(s.to_string())),
            other => other.parse().map(PositionSpec::At),
        }
    }
}

impl Serialize for PositionSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PositionSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Position requested for an append
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WritePosition {
    /// Store assigns the current millisecond with a unique tie-break (`"*"`)
    #[default]
    Auto,
    /// Explicit position; must exceed the log's last position
    At(Position),
}

impl From<Position> for WritePosition {
    fn from(position: Position) -> Self {
        WritePosition::At(position)
    }
}

impl From<Option<Position>> for WritePosition {
    fn from(position: Option<Position>) -> Self {
        position.map_or(WritePosition::Auto, WritePosition::At)
    }
}

impl Display for WritePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePosition::Auto => write!(f, "*"),
            WritePosition::At(position) => write!(f, "{}", position),
        }
    }
}

impl FromStr for WritePosition {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" | "" => Ok(WritePosition::Auto),
            other => other.parse().map(WritePosition::At),
        }
    }
}

impl Serialize for WritePosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WritePosition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        match s {
            Some(s) => s.parse().map_err(serde::de::Error::custom),
            None => Ok(WritePosition::Auto),
        }
    }
}
