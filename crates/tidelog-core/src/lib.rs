//! # Tidelog Core
//!
//! Core traits, types, and errors for the Tidelog stack.
//!
//! This crate provides the foundational abstractions that let the read and
//! write engines, the entry framer, and the session loops work against any
//! log store and any frame-oriented transport.
//!
//! ## Key Traits
//!
//! - [`LogStore`]: Multi-log append-only store with atomic pipelines
//! - [`FrameTransport`]: Message-oriented transport that exchanges whole frames
//! - [`Clock`]: Time abstraction for testability
//!
//! ## Key Types
//!
//! - [`Position`]: `(millis, seq)` token ordering entries within one log
//! - [`Entry`]: One payload appended to a log at a position
//! - [`LogBatch`]: Per-log slice of a read result, possibly carrying a per-log error
//! - [`CursorTable`]: Per-session map of log name to last observed position

pub mod cursor;
pub mod entry;
pub mod error;
pub mod mock_transport;
pub mod position;
pub mod traits;
pub mod transport;

// Re-export main types
pub use cursor::*;
pub use entry::*;
pub use error::*;
pub use mock_transport::*;
pub use position::*;
pub use traits::*;
pub use transport::*;
