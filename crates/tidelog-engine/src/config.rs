//! Configuration for the read and write engines

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidelog_core::TrimPolicy;

/// Default per-log length bound
pub const DEFAULT_MAX_LEN: usize = 1000;

/// Default blocking-read timeout in milliseconds
pub const DEFAULT_BLOCK_MS: u64 = 5000;

/// Engine settings injected by the process entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length bound requested with every append (0 disables trimming)
    pub max_len: usize,
    /// Let the store keep more than `max_len` instead of trimming exactly
    pub approximate_trim: bool,
    /// Block timeout used when a caller gives none, in milliseconds
    pub default_block_ms: u64,
    /// Entries per log per read when a caller gives no count
    pub default_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
            approximate_trim: true,
            default_block_ms: DEFAULT_BLOCK_MS,
            default_count: 1,
        }
    }
}

impl EngineConfig {
    /// Set the length bound
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Choose approximate or exact trimming
    pub fn with_approximate_trim(mut self, approximate: bool) -> Self {
        self.approximate_trim = approximate;
        self
    }

    /// Set the default block timeout
    pub fn with_default_block(mut self, block: Duration) -> Self {
        self.default_block_ms = block.as_millis() as u64;
        self
    }

    /// Set the default read count
    pub fn with_default_count(mut self, count: usize) -> Self {
        self.default_count = count;
        self
    }

    /// Default block timeout as a duration
    pub fn default_block(&self) -> Duration {
        Duration::from_millis(self.default_block_ms)
    }

    /// Trim request attached to every append
    pub fn trim_policy(&self) -> Option<TrimPolicy> {
        if self.max_len == 0 {
            return None;
        }
        Some(TrimPolicy {
            max_len: self.max_len,
            approximate: self.approximate_trim,
        })
    }
}
