//! Prompt assembly for answer generation.
//!
//! Everything here is a pure function of its inputs so prompt formatting can
//! be tested without any provider.

use crate::conversation::{ConversationTurn, Role};
use crate::document::SearchResult;

/// Rendered in place of an empty context block.
pub const NO_CONTEXT_PLACEHOLDER: &str = "No specific context available.";

const DEFAULT_INSTRUCTIONS: &str = "\
Answer the question using the document context and the conversation history below.
If the context does not contain the answer but the conversation history does, use the history.
If neither is enough, give a short general answer from your own knowledge.
Do not mention that a context or documents were provided.";

/// Join retrieved chunk texts in ranked order, separated by blank lines.
///
/// Chunks are not deduplicated; an empty slice yields an empty string.
pub fn build_context(results: &[SearchResult]) -> String {
    results.iter().map(|r| r.chunk.text.trim()).collect::<Vec<_>>().join("\n\n")
}

/// Render conversation turns as `User:`/`Assistant:` lines.
pub fn format_history(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{speaker}: {}", turn.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Template turning (context, question, history) into one prompt string.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::PromptTemplate;
///
/// let prompt = PromptTemplate::default().render(&context, "What color is the sky?", &history);
/// ```
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    instructions: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { instructions: DEFAULT_INSTRUCTIONS.to_string() }
    }
}

impl PromptTemplate {
    /// Use custom instructions in front of the history, context and question.
    pub fn with_instructions(instructions: impl Into<String>) -> Self {
        Self { instructions: instructions.into() }
    }

    /// The instruction preamble.
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Render the full prompt.
    pub fn render(&self, context: &str, question: &str, history: &[ConversationTurn]) -> String {
        let context = if context.trim().is_empty() { NO_CONTEXT_PLACEHOLDER } else { context };
        let history = format_history(history);
        format!(
            "{instructions}\n\nHistory:\n{history}\n\nContext:\n{context}\n\nQuestion: {question}\nAnswer:",
            instructions = self.instructions,
        )
    }
}
