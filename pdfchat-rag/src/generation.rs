//! Answer generation through an external language model.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::conversation::ConversationTurn;
use crate::error::{RagError, Result};
use crate::prompt::PromptTemplate;
use crate::retry::RetryPolicy;

/// A backend that completes a fully rendered prompt.
///
/// Implementations classify their failures as transient or fatal through
/// [`RagError::GenerationError`]; retrying is left to [`GenerationClient`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Return the model's answer to `prompt`.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Provider name used in logs and errors.
    fn name(&self) -> &str {
        "generation"
    }
}

/// Renders prompts and calls a [`GenerationProvider`] with retries.
pub struct GenerationClient {
    provider: Arc<dyn GenerationProvider>,
    template: PromptTemplate,
    retry: RetryPolicy,
}

impl GenerationClient {
    /// Wrap `provider` using the default [`PromptTemplate`].
    pub fn new(provider: Arc<dyn GenerationProvider>, retry: RetryPolicy) -> Self {
        Self { provider, template: PromptTemplate::default(), retry }
    }

    /// Replace the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Generate an answer from retrieved context, the question and prior turns.
    ///
    /// An empty `context` is allowed; the template tells the model that no
    /// document context is available.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `question` is blank
    /// - [`RagError::GenerationError`] if the provider fails or times out after
    ///   retries, or returns an empty answer
    pub async fn generate(
        &self,
        context: &str,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RagError::ConfigError("question must not be empty".to_string()));
        }

        let prompt = self.template.render(context, question, history);
        debug!(
            provider = self.provider.name(),
            prompt_len = prompt.len(),
            history_count = history.len(),
            "generating answer"
        );

        let name = self.provider.name();
        let answer = self
            .retry
            .run_timed(
                "generate",
                || self.provider.complete(&prompt),
                |limit| {
                    RagError::generation_transient(name, format!("no response within {limit:?}"))
                },
            )
            .await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(RagError::generation_fatal(
                self.provider.name(),
                "model returned an empty answer",
            ));
        }
        Ok(answer.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::error::ErrorKind;

    /// Records prompts and replays scripted outcomes, then echoes.
    #[derive(Default)]
    struct ScriptedModel {
        prompts: Mutex<Vec<String>>,
        outcomes: Mutex<Vec<Result<String>>>,
    }

    #[async_trait]
    impl GenerationProvider for ScriptedModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() { Ok("echo".to_string()) } else { outcomes.remove(0) }
        }
    }

    #[tokio::test]
    async fn blank_question_is_rejected_without_a_call() {
        let model = Arc::new(ScriptedModel::default());
        let client = GenerationClient::new(model.clone(), RetryPolicy::none());

        assert!(matches!(client.generate("ctx", "  ", &[]).await, Err(RagError::ConfigError(_))));
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_context_is_allowed() {
        let model = Arc::new(ScriptedModel::default());
        let client = GenerationClient::new(model.clone(), RetryPolicy::none());

        assert_eq!(client.generate("", "Why?", &[]).await.unwrap(), "echo");
        assert!(model.prompts.lock().unwrap()[0].contains("Question: Why?"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried() {
        let model = Arc::new(ScriptedModel::default());
        model
            .outcomes
            .lock()
            .unwrap()
            .push(Err(RagError::generation_transient("scripted", "503 unavailable")));
        let client = GenerationClient::new(model.clone(), RetryPolicy::new(3));

        assert_eq!(client.generate("ctx", "q", &[]).await.unwrap(), "echo");
        assert_eq!(model.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_surfaced_immediately() {
        let model = Arc::new(ScriptedModel::default());
        model
            .outcomes
            .lock()
            .unwrap()
            .push(Err(RagError::generation_fatal("scripted", "400 invalid argument")));
        let client = GenerationClient::new(model.clone(), RetryPolicy::new(3));

        let err = client.generate("ctx", "q", &[]).await.unwrap_err();
        assert!(matches!(err, RagError::GenerationError { .. }));
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    /// Never answers.
    struct SilentModel;

    #[async_trait]
    impl GenerationProvider for SilentModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out_as_transient() {
        let policy = RetryPolicy::new(2).with_attempt_timeout(Duration::from_secs(30));
        let client = GenerationClient::new(Arc::new(SilentModel), policy);

        let started = tokio::time::Instant::now();
        let err = client.generate("ctx", "q", &[]).await.unwrap_err();

        assert!(matches!(err, RagError::GenerationError { kind: ErrorKind::Transient, .. }));
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn empty_answer_is_an_error() {
        let model = Arc::new(ScriptedModel::default());
        model.outcomes.lock().unwrap().push(Ok("   ".to_string()));
        let client = GenerationClient::new(model, RetryPolicy::none());

        let err = client.generate("ctx", "q", &[]).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn custom_template_is_used() {
        let model = Arc::new(ScriptedModel::default());
        let client = GenerationClient::new(model.clone(), RetryPolicy::none())
            .with_template(PromptTemplate::with_instructions("Answer in French."));

        client.generate("ctx", "q", &[]).await.unwrap();
        assert!(model.prompts.lock().unwrap()[0].starts_with("Answer in French."));
    }
}
