//! Conversation history and the per-session chat loop.
//!
//! A [`ChatSession`] owns one [`ConversationState`]. Each call to
//! [`ChatSession::ask`] holds the session lock from the moment the question
//! is recorded until the answer is recorded, so turns of one session never
//! interleave. Separate sessions share nothing but the retriever and the
//! generation client, and run in parallel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::{RagError, Result};
use crate::generation::GenerationClient;
use crate::prompt::build_context;
use crate::retriever::Retriever;

/// Who produced a [`ConversationTurn`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions.
    User,
    /// The generative model.
    Assistant,
}

/// One message of a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub text: String,
    /// Position in the conversation, strictly increasing.
    pub sequence: u64,
    /// When the turn was appended.
    pub timestamp: DateTime<Utc>,
}

/// Ordered, append-only list of turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    turns: Vec<ConversationTurn>,
    next_sequence: u64,
}

impl ConversationState {
    /// Create an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return a reference to it.
    pub fn push(&mut self, role: Role, text: impl Into<String>) -> &ConversationTurn {
        let turn = ConversationTurn {
            role,
            text: text.into(),
            sequence: self.next_sequence,
            timestamp: Utc::now(),
        };
        self.next_sequence += 1;
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Up to `n` turns preceding the latest one, oldest first.
    pub fn history_before_last(&self, n: usize) -> &[ConversationTurn] {
        let previous = &self.turns[..self.turns.len().saturating_sub(1)];
        &previous[previous.len().saturating_sub(n)..]
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns `true` if no turn has been recorded.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Remove every turn.
    ///
    /// Sequence numbers keep increasing across clears; a turn's
    /// `sequence` is never reused within a session.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// One conversation over the ingested documents.
///
/// Created by [`RagPipeline::new_session`](crate::RagPipeline::new_session)
/// or a [`SessionManager`](crate::SessionManager).
pub struct ChatSession {
    id: String,
    retriever: Arc<Retriever>,
    generator: Arc<GenerationClient>,
    history_turns: usize,
    state: Mutex<ConversationState>,
}

impl ChatSession {
    /// Create a session with an empty conversation.
    pub fn new(
        id: impl Into<String>,
        retriever: Arc<Retriever>,
        generator: Arc<GenerationClient>,
        history_turns: usize,
    ) -> Self {
        Self {
            id: id.into(),
            retriever,
            generator,
            history_turns,
            state: Mutex::new(ConversationState::new()),
        }
    }

    /// The session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Answer a question using retrieved chunks and recent history.
    ///
    /// The question is recorded before retrieval starts. If retrieval or
    /// generation fails the question stays recorded, no answer is appended,
    /// and the error is returned; calling `ask` again repeats the whole
    /// retrieval.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for a blank question (nothing is
    /// recorded in that case), or the retrieval/generation error.
    pub async fn ask(&self, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RagError::ConfigError("question must not be empty".to_string()));
        }

        let mut state = self.state.lock().await;
        state.push(Role::User, question);

        let results = self.retriever.retrieve(question).await.inspect_err(|e| {
            error!(session.id = %self.id, error = %e, "retrieval failed");
        })?;
        let context = build_context(&results);

        // The question itself is passed separately.
        let history = state.history_before_last(self.history_turns);

        let answer =
            self.generator.generate(&context, question, history).await.inspect_err(|e| {
                error!(session.id = %self.id, error = %e, "generation failed");
            })?;
        let history_count = history.len();

        state.push(Role::Assistant, answer.clone());
        info!(
            session.id = %self.id,
            result_count = results.len(),
            history_count,
            turn_count = state.len(),
            "answered question"
        );
        Ok(answer)
    }

    /// Forget the conversation. Ingested documents are not touched.
    pub async fn clear(&self) {
        self.state.lock().await.clear();
        info!(session.id = %self.id, "conversation cleared");
    }

    /// Snapshot of the conversation, oldest turn first.
    pub async fn turns(&self) -> Vec<ConversationTurn> {
        self.state.lock().await.turns().to_vec()
    }

    /// Number of recorded turns.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Returns `true` if no turn is recorded.
    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.is_empty()
    }
}
