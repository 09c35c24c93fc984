//! Question → top-k chunks.

use std::sync::Arc;

use tracing::{debug, info};

use crate::document::RetrievalResult;
use crate::embedding::EmbeddingClient;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Embeds a question and looks up its nearest stored chunks.
///
/// Every top-k result is returned, however weakly similar, unless a
/// `max_distance` cutoff was configured. Relevance is left to the
/// generative model reading the chunks.
pub struct Retriever {
    embedder: Arc<EmbeddingClient>,
    store: Arc<dyn VectorStore>,
    default_k: usize,
    max_distance: Option<f32>,
}

impl Retriever {
    /// Create a retriever returning `default_k` results per question.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `default_k == 0` or if the store
    /// and the embedding client disagree on dimensionality.
    pub fn new(
        embedder: Arc<EmbeddingClient>,
        store: Arc<dyn VectorStore>,
        default_k: usize,
    ) -> Result<Self> {
        check_k(default_k)?;
        if embedder.dimensions() != store.dimensions() {
            return Err(RagError::ConfigError(format!(
                "embedding dimension {} does not match store dimension {}",
                embedder.dimensions(),
                store.dimensions()
            )));
        }
        Ok(Self { embedder, store, default_k, max_distance: None })
    }

    /// Drop results whose cosine distance exceeds `max_distance`.
    pub fn with_max_distance(mut self, max_distance: Option<f32>) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// The number of results [`retrieve`](Self::retrieve) asks for.
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Retrieve the default number of chunks for `question`.
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        self.retrieve_top(question, self.default_k).await
    }

    /// Retrieve at most `k` chunks for `question`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `k == 0`, otherwise any embedding
    /// or store error.
    pub async fn retrieve_top(&self, question: &str, k: usize) -> Result<RetrievalResult> {
        check_k(k)?;

        let query_embedding = self.embedder.embed_query(question).await?;
        let mut results = self.store.query_nearest(&query_embedding, k).await?;
        debug!(k, candidates = results.len(), "nearest chunks fetched");

        if let Some(max) = self.max_distance {
            results.retain(|r| r.distance <= max);
        }

        info!(result_count = results.len(), k, "retrieval completed");
        Ok(results)
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::ConfigError("k must be greater than zero".to_string()));
    }
    Ok(())
}
