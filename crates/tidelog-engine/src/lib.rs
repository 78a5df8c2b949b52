//! # Tidelog Engine
//!
//! Cursor-based multi-log read and write engines.
//!
//! The engines hold no state of their own beyond an explicit store handle
//! and an [`EngineConfig`]; cursor tables belong to the caller.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tidelog_core::{AppendRequest, CursorTable, PositionSpec, SystemClock};
//! use tidelog_engine::{Engine, EngineConfig, ReadPolicy};
//! use tidelog_storage::InMemoryLogStore;
//!
//! let engine = Engine::new(Arc::new(InMemoryLogStore::new()), EngineConfig::default());
//! engine.writer().append_batch(&[AppendRequest::new("cam", "frame")]).await?;
//!
//! let mut cursor = CursorTable::init(vec![("cam", PositionSpec::Beginning)], "", &SystemClock);
//! let batch = engine
//!     .reader()
//!     .read(&mut cursor, ReadPolicy::Ordered, 10, Some(Duration::ZERO))
//!     .await?;
//! ```

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod reader;
pub mod writer;

// Re-exports
pub use command::{
    AddEntry, BatchView, Command, CommandReply, EntryView, InfoView, RangeArgs, parse_command,
};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use reader::{RangeSpec, ReadEngine, ReadPolicy};
pub use writer::WriteEngine;
