use async_trait::async_trait;
use dashmap::DashMap;
use rig::completion::Message;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Where a session sits in the exchange protocol.
///
/// `Idle` means no case has been selected yet; `AwaitingSeed` means a case
/// document was chosen and its first exchange is in flight; `Conversing`
/// self-loops for every subsequent user prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    AwaitingSeed,
    Conversing,
}

/// One user's conversation with the AI patient: ordered exchange history plus
/// protocol phase. Owned by a [`SessionStore`]; mutated by appending a
/// (prompt, reply) pair per exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    pub phase: SessionPhase,
    pub case_file: Option<String>,
    pub history: Vec<Message>,
}

impl ConversationSession {
    pub fn new(id: String) -> Self {
        Self {
            id,
            phase: SessionPhase::Idle,
            case_file: None,
            history: Vec::new(),
        }
    }
}

/// Trait for storing and retrieving conversation sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: ConversationSession) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<ConversationSession>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStore
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<String, ConversationSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: ConversationSession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<ConversationSession>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = InMemorySessionStore::new();

        let session = ConversationSession::new("session1".to_string());
        assert_eq!(session.phase, SessionPhase::Idle);
        assert!(session.history.is_empty());

        store.save(session).await.unwrap();
        let loaded = store.get("session1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "session1");
        assert!(loaded.case_file.is_none());

        store.delete("session1").await.unwrap();
        assert!(store.get("session1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_missing_session() {
        let store = InMemorySessionStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }
}
