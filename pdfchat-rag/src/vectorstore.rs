//! Vector store trait for storing and searching chunk embeddings.
//!
//! The distance metric is cosine distance for every backend and cannot be
//! changed on an existing store; a different metric or embedding model means
//! resetting the store and re-ingesting every document.

use async_trait::async_trait;

use crate::document::{EmbeddedChunk, RetrievalResult};
use crate::error::Result;

/// A storage backend for chunk embeddings with nearest-neighbour search.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new(768);
/// store.initialize().await?;
/// store.upsert(&embedded_chunks).await?;
/// let results = store.query_nearest(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the schema and index if missing. Idempotent.
    ///
    /// Fails with [`RagError::StoreSchemaError`](crate::RagError::StoreSchemaError)
    /// if existing data was written with a different dimensionality.
    async fn initialize(&self) -> Result<()>;

    /// Append chunks with their embeddings.
    ///
    /// Chunks are never deduplicated: storing the same text twice yields two
    /// rows. Surrogate ids are assigned in slice order.
    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<()>;

    /// Return at most `k` stored chunks ordered by ascending cosine distance
    /// to `embedding`. Equal distances keep insertion order.
    async fn query_nearest(&self, embedding: &[f32], k: usize) -> Result<RetrievalResult>;

    /// Delete every stored chunk. Idempotent.
    async fn reset(&self) -> Result<()>;

    /// Number of stored chunks.
    async fn count(&self) -> Result<usize>;

    /// Dimensionality every stored embedding has.
    fn dimensions(&self) -> usize;
}

/// Cosine distance `1 - cos(a, b)`.
///
/// Returns 1.0 (no similarity) if either vector has zero magnitude.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}
