//! Session persistence behind a trait, so hosts can swap the in-memory
//! store for something durable without touching engine code.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use super::Session;

/// Persistence seam for sessions. `load` returns whatever is stored,
/// expired or not; expiry policy belongs to the engine.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, token: &str) -> Result<Option<Session>>;
    async fn save(&self, session: &Session) -> Result<()>;
    /// Returns whether a session was actually removed.
    async fn delete(&self, token: &str) -> Result<bool>;
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every expired session. The engine already removes expired
    /// sessions on access; this catches the ones nobody came back for.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "purged expired sessions");
        }
        removed
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<bool> {
        Ok(self.sessions.write().await.remove(token).is_some())
    }
}
