//! # Tidelog Storage
//!
//! Store backends for Tidelog.
//!
//! The engines talk to an external multi-log store through the
//! [`LogStore`](tidelog_core::LogStore) trait. This crate provides the
//! in-process implementation used by tests, the demo server, and any
//! deployment that does not need durability.
//!
//! ## Features
//!
//! - **InMemoryLogStore**: Atomic multi-log reads and appends, blocking reads
//!   with timeout, auto-assigned positions, per-log type errors
//! - **Trimmer**: Exact and approximate max-length trimming
//!
//! ## Example
//!
//! ```rust,ignore
//! use tidelog_core::{AppendRequest, LogStore, Position};
//! use tidelog_storage::InMemoryLogStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryLogStore::new();
//!     store
//!         .append_batch(&[AppendRequest::new("cam", "frame")], None)
//!         .await
//!         .unwrap();
//!
//!     let cursors = vec![("cam".to_string(), Position::BEGINNING)];
//!     let batch = store.read_after(&cursors, 10, None).await.unwrap();
//!     assert_eq!(batch[0].entries.len(), 1);
//! }
//! ```

pub mod memory;
pub mod trim;

// Re-exports
pub use memory::InMemoryLogStore;
pub use trim::{Trimmer, TrimmerBuilder};
