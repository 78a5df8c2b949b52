//! Registry of live WebSocket sessions

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Direction of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Pull,
    Push,
}

/// What the registry knows about one live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub id: u64,
    pub kind: SessionKind,
    /// Client log names from the session address
    pub logs: Vec<String>,
    pub started_at: DateTime<Utc>,
}

/// Concurrent map of live sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: DashMap<u64, SessionInfo>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session; it is removed when the guard drops
    pub fn register(self: &Arc<Self>, kind: SessionKind, logs: Vec<String>) -> SessionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.sessions.insert(
            id,
            SessionInfo {
                id,
                kind,
                logs,
                started_at: Utc::now(),
            },
        );
        SessionGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Live sessions, oldest first
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> =
            self.sessions.iter().map(|entry| entry.value().clone()).collect();
        sessions.sort_by_key(|info| info.id);
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Keeps a session listed while alive
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: u64,
}

impl SessionGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.sessions.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_unregisters() {
        let registry = Arc::new(SessionRegistry::new());
        let pull = registry.register(SessionKind::Pull, vec!["cam".into()]);
        let push = registry.register(SessionKind::Push, vec!["a".into(), "b".into()]);

        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, pull.id());
        assert_eq!(listed[1].kind, SessionKind::Push);

        drop(pull);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].id, push.id());

        drop(push);
        assert!(registry.is_empty());
    }
}
