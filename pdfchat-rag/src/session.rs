//! Registry of concurrent chat sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::conversation::ChatSession;
use crate::generation::GenerationClient;
use crate::retriever::Retriever;

/// Creates and tracks [`ChatSession`]s sharing one retriever and model.
///
/// Cloning the manager is cheap; clones see the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    retriever: Arc<Retriever>,
    generator: Arc<GenerationClient>,
    history_turns: usize,
    sessions: Arc<RwLock<HashMap<String, Arc<ChatSession>>>>,
}

impl SessionManager {
    /// Create an empty registry; every session sends `history_turns` turns.
    pub fn new(
        retriever: Arc<Retriever>,
        generator: Arc<GenerationClient>,
        history_turns: usize,
    ) -> Self {
        Self { retriever, generator, history_turns, sessions: Arc::default() }
    }

    /// Start a new session with a random UUID v4 id.
    pub async fn create_session(&self) -> Arc<ChatSession> {
        let session_id = Uuid::new_v4().to_string();
        let session = Arc::new(ChatSession::new(
            session_id.clone(),
            self.retriever.clone(),
            self.generator.clone(),
            self.history_turns,
        ));
        self.sessions.write().await.insert(session_id.clone(), session.clone());
        info!(session.id = %session_id, "session created");
        session
    }

    /// Look up an open session by id.
    pub async fn get(&self, session_id: &str) -> Option<Arc<ChatSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop a session. Returns `false` if it did not exist.
    pub async fn close(&self, session_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(session.id = %session_id, "session closed");
        }
        removed
    }

    /// Number of open sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if no session is open.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
