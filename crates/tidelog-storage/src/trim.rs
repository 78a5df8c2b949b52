//! Max-length trimming
//!
//! Decides how many of the oldest entries an append should evict. Exact
//! trimming keeps precisely `max_len` entries. Approximate trimming only
//! evicts whole nodes of `node_size` entries, so a log may temporarily hold
//! up to `max_len + node_size - 1` entries but is not trimmed on every write.

use tidelog_core::TrimPolicy;

/// Default number of entries per eviction node
pub const DEFAULT_NODE_SIZE: usize = 100;

/// Computes evictions for a [`TrimPolicy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trimmer {
    /// Entries evicted together under approximate trimming
    node_size: usize,
}

impl Default for Trimmer {
    fn default() -> Self {
        Self {
            node_size: DEFAULT_NODE_SIZE,
        }
    }
}

impl Trimmer {
    /// Create a trimmer with the given node size (minimum 1)
    pub fn new(node_size: usize) -> Self {
        Self {
            node_size: node_size.max(1),
        }
    }

    /// Get the node size
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Number of oldest entries to evict from a log of `len` entries
    pub fn excess(&self, len: usize, policy: TrimPolicy) -> usize {
        let over = len.saturating_sub(policy.max_len);
        if !policy.approximate {
            return over;
        }
        // Whole nodes only
        (over / self.node_size) * self.node_size
    }
}

/// Builder for Trimmer
#[derive(Debug, Default)]
pub struct TrimmerBuilder {
    node_size: Option<usize>,
}

impl TrimmerBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the node size
    pub fn node_size(mut self, size: usize) -> Self {
        self.node_size = Some(size);
        self
    }

    /// Build the Trimmer
    pub fn build(self) -> Trimmer {
        match self.node_size {
            Some(size) => Trimmer::new(size),
            None => Trimmer::default(),
        }
    }
}
