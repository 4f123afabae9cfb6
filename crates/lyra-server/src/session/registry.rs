//! Process-wide registry of live call sessions.
//!
//! Holds a non-owning reference per session for targeted cancellation (the
//! beacon path). Entries live exactly from accept to cleanup.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::call::CallSession;

/// Concurrent map of session id → live session.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<CallSession>>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a session at accept time.
    pub async fn register(&self, session: Arc<CallSession>) {
        let mut sessions = self.sessions.write().await;
        let _ = sessions.insert(session.id.clone(), session);
    }

    /// Remove a session at cleanup time.
    pub async fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        let _ = sessions.remove(session_id);
    }

    /// Look up a live session.
    pub async fn get(&self, session_id: &str) -> Option<Arc<CallSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Number of live sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Cancel every live session (process shutdown).
    pub async fn cancel_all(&self) {
        let sessions = self.sessions.read().await;
        debug!(count = sessions.len(), "cancelling all live sessions");
        for session in sessions.values() {
            session.cancel();
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
