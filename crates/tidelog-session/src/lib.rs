//! # Tidelog Session
//!
//! Per-connection loops that drive the engines over a
//! [`FrameTransport`](tidelog_core::FrameTransport).
//!
//! - [`PullSession`]: read, pack, send header and buffer, pace, await ack
//! - [`PushSession`]: receive header and buffer, unpack, append, ack
//!
//! Each session owns its transport, its cursor table and its namespace; the
//! only thing sessions share is the store behind the engines. A session
//! ends when the transport disconnects (cleanly) or the store becomes
//! unavailable (with an error). There is no retry.

pub mod error;
pub mod namespace;
pub mod pull;
pub mod push;
pub mod rate;
pub mod state;

// Re-exports
pub use error::{SessionError, SessionResult};
pub use namespace::{LogNamespace, TenantScope};
pub use pull::{PullOptions, PullSession};
pub use push::{PushOptions, PushSession};
pub use rate::RateLimiter;
pub use state::{SessionState, SessionStats};
