//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates the ingest-and-chat workflow by composing
//! an [`EmbeddingProvider`], a [`VectorStore`], a [`Chunker`] and a
//! [`GenerationProvider`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pdfchat_rag::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new(768)))
//!     .generation_provider(Arc::new(my_model))
//!     .build()?;
//!
//! pipeline.initialize().await?;
//! pipeline.ingest(&document).await?;
//! let session = pipeline.new_session().await;
//! let answer = session.ask("What is this document about?").await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::chunking::{Chunker, FixedSizeChunker, SeparatorChunker};
use crate::config::{ChunkingStrategy, RagConfig};
use crate::conversation::ChatSession;
use crate::document::{Chunk, Document, EmbeddedChunk, RetrievalResult};
use crate::embedding::{EmbeddingClient, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::{GenerationClient, GenerationProvider};
use crate::prompt::PromptTemplate;
use crate::retriever::Retriever;
use crate::retry::RetryPolicy;
use crate::session::SessionManager;
use crate::vectorstore::VectorStore;

/// The RAG pipeline orchestrator.
///
/// Coordinates document ingestion (chunk → embed → store), retrieval
/// (embed → search) and chat sessions. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    embedder: Arc<EmbeddingClient>,
    retriever: Arc<Retriever>,
    sessions: SessionManager,
    document_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Return the retriever shared by every session.
    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    /// Return the session registry.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Prepare the vector store (schema, index). Idempotent.
    pub async fn initialize(&self) -> Result<()> {
        self.vector_store.initialize().await.inspect_err(|e| {
            error!(error = %e, "failed to initialize vector store");
        })
    }

    /// Ingest a single document: chunk → embed → store.
    ///
    /// Returns the chunks that were stored. A document with no text stores
    /// nothing. Ingestions of the same document id run one at a time; other
    /// documents and queries are not blocked.
    ///
    /// # Errors
    ///
    /// Returns the embedding or store error. Nothing is stored for the
    /// document if embedding fails.
    pub async fn ingest(&self, document: &Document) -> Result<Vec<Chunk>> {
        let lock = self.document_lock(&document.id).await;
        let result = {
            let _guard = lock.lock().await;
            self.ingest_locked(document).await
        };
        self.release_document_lock(&document.id, lock).await;
        result
    }

    async fn ingest_locked(&self, document: &Document) -> Result<Vec<Chunk>> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(chunks);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed(&texts).await.inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
        })?;

        let embedded: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();

        self.vector_store.upsert(&embedded).await.inspect_err(|e| {
            error!(document.id = %document.id, error = %e, "upsert failed during ingestion");
        })?;

        info!(document.id = %document.id, chunk_count = embedded.len(), "ingested document");
        Ok(embedded.into_iter().map(|e| e.chunk).collect())
    }

    /// Ingest several documents in order, stopping at the first failure.
    ///
    /// Documents ingested before the failure stay stored.
    pub async fn ingest_batch(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        for document in documents {
            let chunks = self.ingest(document).await?;
            all_chunks.extend(chunks);
        }
        Ok(all_chunks)
    }

    /// Replace the whole corpus: reset the store, then ingest `documents`.
    pub async fn reindex(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        self.reset_store().await?;
        let chunks = self.ingest_batch(documents).await?;
        info!(document_count = documents.len(), chunk_count = chunks.len(), "reindexed corpus");
        Ok(chunks)
    }

    /// Delete every stored chunk. Sessions keep their history.
    pub async fn reset_store(&self) -> Result<()> {
        self.vector_store.reset().await.inspect_err(|e| {
            error!(error = %e, "failed to reset vector store");
        })?;
        info!("vector store reset");
        Ok(())
    }

    /// Retrieve the top-k chunks for `question` without generating an answer.
    pub async fn query(&self, question: &str) -> Result<RetrievalResult> {
        self.retriever.retrieve(question).await.inspect_err(|e| {
            error!(error = %e, "query failed");
        })
    }

    /// Start a new chat session over the ingested documents.
    pub async fn new_session(&self) -> Arc<ChatSession> {
        self.sessions.create_session().await
    }

    async fn document_lock(&self, document_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.document_locks.lock().await;
        locks.entry(document_id.to_string()).or_default().clone()
    }

    /// Drop the lock entry once no other ingestion of the document holds it.
    async fn release_document_lock(&self, document_id: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.document_locks.lock().await;
        // Held by the map and `lock` only.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(document_id);
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider`, `vector_store` and `generation_provider` are
/// required. Without an explicit chunker one is built from
/// [`RagConfig::chunking`]; without a config the defaults apply.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(config)
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .generation_provider(Arc::new(model))
///     .chunker(Arc::new(FixedSizeChunker::new(512, 100)?))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    template: Option<PromptTemplate>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the chunker derived from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Replace the default prompt template.
    pub fn prompt_template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Build the [`RagPipeline`], validating the config and every component.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing, the
    /// config is invalid, or the provider, store and config disagree on the
    /// embedding dimensionality.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;

        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => match config.chunking {
                ChunkingStrategy::Fixed => {
                    Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?)
                }
                ChunkingStrategy::Separator => {
                    Arc::new(SeparatorChunker::new(config.chunk_size, config.chunk_overlap)?)
                }
            },
        };

        let retry = RetryPolicy::from_config(&config.retry);
        let embedder =
            Arc::new(EmbeddingClient::new(embedding_provider, config.dimensions, retry)?);
        let retriever = Arc::new(
            Retriever::new(embedder.clone(), vector_store.clone(), config.top_k)?
                .with_max_distance(config.max_distance),
        );

        let mut generator = GenerationClient::new(generation_provider, retry);
        if let Some(template) = self.template {
            generator = generator.with_template(template);
        }
        let sessions =
            SessionManager::new(retriever.clone(), Arc::new(generator), config.history_turns);

        Ok(RagPipeline {
            config,
            vector_store,
            chunker,
            embedder,
            retriever,
            sessions,
            document_locks: Mutex::new(HashMap::new()),
        })
    }
}
