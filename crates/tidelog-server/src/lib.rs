//! # Tidelog Server
//!
//! WebSocket and HTTP front end for the Tidelog engines.
//!
//! Pull and push sessions run one task per WebSocket connection over
//! [`WsFrameTransport`]. Request/response routes share the same engines
//! through [`AppState`]. The store handle is built by the entry point and
//! passed in explicitly.

pub mod config;
pub mod error;
pub mod query;
pub mod registry;
pub mod routes;
pub mod state;
pub mod ws;

// Re-exports
pub use config::{Cli, DEFAULT_DEVICE, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use registry::{SessionGuard, SessionInfo, SessionKind, SessionRegistry};
pub use routes::router;
pub use state::AppState;
pub use ws::WsFrameTransport;
