//! Embedding providers and the client that enforces their contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};
use crate::retry::RetryPolicy;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Gemini, a local model,
/// a test double) behind a unified async interface. Providers only transport
/// requests; batching rules, retries and dimension checks live in
/// [`EmbeddingClient`].
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Generate the embedding of a search query.
    ///
    /// Backends that embed queries and documents differently override this;
    /// the default embeds `text` as a one-element batch.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        if vectors.len() != 1 {
            return Err(RagError::embedding_fatal(
                self.name(),
                format!("requested 1 query embedding, received {}", vectors.len()),
            ));
        }
        Ok(vectors.swap_remove(0))
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Provider name used in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Calls an [`EmbeddingProvider`] with retries and validates every response.
///
/// - empty batches are rejected before any request is made
/// - transient failures and attempts that exceed the policy's attempt timeout
///   are retried under the configured [`RetryPolicy`]
/// - a response must hold one vector per input, in input order
/// - every vector must have exactly `dimensions` components
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
    dimensions: usize,
}

impl EmbeddingClient {
    /// Wrap `provider`, expecting vectors of `dimensions` components.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the provider reports a different
    /// dimensionality than the one configured.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        dimensions: usize,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if provider.dimensions() != dimensions {
            return Err(RagError::ConfigError(format!(
                "embedding provider '{}' produces {} dimensions but {dimensions} are configured",
                provider.name(),
                provider.dimensions()
            )));
        }
        Ok(Self { provider, retry, dimensions })
    }

    /// The dimensionality every returned vector has.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed a batch of texts, one vector per text, in order.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(RagError::ConfigError("cannot embed an empty batch".to_string()));
        }

        debug!(provider = self.provider.name(), batch_size = texts.len(), "embedding batch");
        let vectors = self
            .retry
            .run_timed("embed", || self.provider.embed_batch(texts), |limit| self.timed_out(limit))
            .await?;

        if vectors.len() != texts.len() {
            return Err(RagError::embedding_fatal(
                self.provider.name(),
                format!("requested {} embeddings, received {}", texts.len(), vectors.len()),
            ));
        }
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        Ok(vectors)
    }

    /// Embed a search query through the provider's query path.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self
            .retry
            .run_timed(
                "embed_query",
                || self.provider.embed_query(text),
                |limit| self.timed_out(limit),
            )
            .await?;
        self.check_dimensions(&vector)?;
        Ok(vector)
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn timed_out(&self, limit: Duration) -> RagError {
        RagError::embedding_transient(self.provider.name(), format!("no response within {limit:?}"))
    }
}
