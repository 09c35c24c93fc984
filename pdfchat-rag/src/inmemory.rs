//! In-memory vector store using exact cosine search.
//!
//! This module provides [`InMemoryVectorStore`], a dependency-free store
//! backed by a `Vec` protected by a `tokio::sync::RwLock`. It scans every
//! row on each query, which suits tests, demos and small corpora.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{EmbeddedChunk, RetrievalResult, SearchResult, StoredChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorStore, cosine_distance};

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct Rows {
    chunks: Vec<StoredChunk>,
    next_id: u64,
}

/// An in-memory vector store using cosine distance for search.
///
/// Rows are kept in insertion order; queries take a read lock so any number
/// of them run concurrently, and upserts hold the write lock only while
/// appending.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new(768);
/// store.upsert(&chunks).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimensions: usize,
    rows: RwLock<Rows>,
}

impl InMemoryVectorStore {
    /// Create a new empty store for vectors of `dimensions` components.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, rows: RwLock::new(Rows::default()) }
    }

    /// Snapshot of every stored row, in insertion order.
    pub async fn stored(&self) -> Vec<StoredChunk> {
        self.rows.read().await.chunks.clone()
    }

    fn check_dimensions(&self, actual: usize) -> Result<()> {
        if actual != self.dimensions {
            return Err(RagError::StoreSchemaError {
                backend: BACKEND.to_string(),
                message: format!(
                    "store holds vector({}) but received a vector of {actual} components",
                    self.dimensions
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, chunks: &[EmbeddedChunk]) -> Result<()> {
        for chunk in chunks {
            self.check_dimensions(chunk.embedding.len())?;
        }

        let mut rows = self.rows.write().await;
        for chunk in chunks {
            let id = rows.next_id;
            rows.next_id += 1;
            rows.chunks.push(StoredChunk {
                id,
                chunk: chunk.chunk.clone(),
                embedding: chunk.embedding.clone(),
            });
        }
        debug!(
            backend = BACKEND,
            count = chunks.len(),
            total = rows.chunks.len(),
            "upserted chunks"
        );
        Ok(())
    }

    async fn query_nearest(&self, embedding: &[f32], k: usize) -> Result<RetrievalResult> {
        self.check_dimensions(embedding.len())?;

        let rows = self.rows.read().await;
        let mut scored: Vec<SearchResult> = rows
            .chunks
            .iter()
            .map(|row| SearchResult {
                chunk: row.chunk.clone(),
                distance: cosine_distance(&row.embedding, embedding),
            })
            .collect();

        // Stable sort: equal distances stay in insertion order.
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }

    async fn reset(&self) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.chunks.clear();
        debug!(backend = BACKEND, "store reset");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.read().await.chunks.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
