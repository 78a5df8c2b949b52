//! Shared handler state

use std::sync::Arc;

use tidelog_core::SharedStore;
use tidelog_engine::Engine;
use tidelog_session::{LogNamespace, TenantScope};

use crate::config::ServerConfig;
use crate::registry::SessionRegistry;

/// State cloned into every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Engine,
    pub config: Arc<ServerConfig>,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    /// Build the engines over an explicit store handle
    pub fn new(store: SharedStore, config: ServerConfig) -> Self {
        Self {
            engine: Engine::new(store, config.engine),
            config: Arc::new(config),
            sessions: Arc::new(SessionRegistry::new()),
        }
    }

    /// Namespace for one request
    ///
    /// With device prefixing on, names are qualified as `device:prefix` and
    /// `device_id` falls back to the configured default device. `keep`
    /// overrides whether that qualification is stripped from outgoing names.
    pub fn namespace(&self, device_id: Option<&str>, prefix: &str, keep: Option<bool>) -> LogNamespace {
        let namespace = LogNamespace::with_prefix(prefix);
        if !self.config.multi_device_prefixing {
            return namespace;
        }

        let device = device_id
            .filter(|device| !device.is_empty())
            .unwrap_or(&self.config.default_device);
        let mut scope = TenantScope::new(device);
        if let Some(keep) = keep {
            scope = scope.keep_in_names(keep);
        }
        namespace.scoped(scope)
    }
}
