//! Log namespacing
//!
//! A session may be scoped to a tenant (device) and a prefix. Every log name
//! the client uses is qualified as `<tenant>:<prefix><name>` before it
//! reaches the store, and pulled names are optionally stripped back to the
//! client's form before they are sent.

use serde::{Deserialize, Serialize};

/// Tenant scope of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantScope {
    /// Tenant (device) identifier
    pub tenant: String,
    /// Keep the qualified name in pulled headers
    pub keep_in_names: bool,
}

impl TenantScope {
    /// Scope to a tenant; wildcard tenants keep qualified names by default
    pub fn new(tenant: impl Into<String>) -> Self {
        let tenant = tenant.into();
        let keep_in_names = tenant.contains('*');
        Self {
            tenant,
            keep_in_names,
        }
    }

    /// Override whether qualified names are kept in pulled headers
    pub fn keep_in_names(mut self, keep: bool) -> Self {
        self.keep_in_names = keep;
        self
    }
}

/// Maps client log names to store log names and back
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogNamespace {
    /// Optional tenant scope
    pub scope: Option<TenantScope>,
    /// Prefix applied after the tenant
    pub prefix: String,
}

impl LogNamespace {
    /// Namespace with no tenant and no prefix
    pub fn root() -> Self {
        Self::default()
    }

    /// Namespace with only a prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            scope: None,
            prefix: prefix.into(),
        }
    }

    /// Add a tenant scope
    pub fn scoped(mut self, scope: TenantScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Full store-side prefix
    pub fn store_prefix(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}:{}", scope.tenant, self.prefix),
            None => self.prefix.clone(),
        }
    }

    /// Store name for a client log name
    pub fn qualify(&self, log: &str) -> String {
        format!("{}{}", self.store_prefix(), log)
    }

    /// Client-facing name for a store log name
    ///
    /// The prefix is stripped only when the session is tenant-scoped and
    /// was not asked to keep qualified names.
    pub fn present(&self, log: &str) -> String {
        let strip = matches!(&self.scope, Some(scope) if !scope.keep_in_names);
        if strip {
            let prefix = self.store_prefix();
            if let Some(rest) = log.strip_prefix(prefix.as_str()) {
                return rest.to_string();
            }
        }
        log.to_string()
    }
}
