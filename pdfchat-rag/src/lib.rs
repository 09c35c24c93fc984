//! # pdfchat-rag
//!
//! Retrieval-augmented conversation over text extracted from PDF documents.
//!
//! ## Overview
//!
//! Documents are split into overlapping chunks, embedded, and stored in a
//! vector store. A [`ChatSession`] answers each question by retrieving the
//! nearest chunks and asking a generative model with the recent conversation
//! history as additional context.
//!
//! - [`Chunker`] - [`FixedSizeChunker`] and [`SeparatorChunker`]
//! - [`EmbeddingProvider`] / [`EmbeddingClient`] - text → vectors, with retries
//! - [`VectorStore`] - [`InMemoryVectorStore`] or `PgVectorStore` (feature `pgvector`)
//! - [`Retriever`] - question → top-k chunks by cosine distance
//! - [`GenerationProvider`] / [`GenerationClient`] - prompt → answer, with retries
//! - [`ChatSession`] / [`SessionManager`] - per-session conversation state
//! - [`RagPipeline`] - wires everything together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pdfchat_rag::gemini::{GeminiConfig, GeminiEmbeddingProvider, GeminiGenerationProvider};
//! use pdfchat_rag::{Document, InMemoryVectorStore, RagConfig, RagPipeline};
//!
//! let gemini = GeminiConfig::from_env()?;
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(GeminiEmbeddingProvider::new(gemini.clone())?))
//!     .generation_provider(Arc::new(GeminiGenerationProvider::new(gemini)?))
//!     .vector_store(Arc::new(InMemoryVectorStore::new(768)))
//!     .build()?;
//!
//! pipeline.ingest(&Document::new("report", text)).await?;
//! let session = pipeline.new_session().await;
//! println!("{}", session.ask("What does the report conclude?").await?);
//! ```
//!
//! ## Features
//!
//! - `gemini` - Gemini embedding and generation providers (reqwest)
//! - `pgvector` - PostgreSQL + pgvector store (sqlx)
//! - `full` - both

pub mod chunking;
pub mod config;
pub mod conversation;
pub mod document;
pub mod embedding;
pub mod error;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod generation;
pub mod inmemory;
#[cfg(feature = "pgvector")]
pub mod pgvector;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod retry;
pub mod session;
pub mod vectorstore;

pub use chunking::{Chunker, FixedSizeChunker, SeparatorChunker, merge_chunks};
pub use config::{ChunkingStrategy, RagConfig, RagConfigBuilder};
pub use conversation::{ChatSession, ConversationState, ConversationTurn, Role};
pub use document::{Chunk, Document, EmbeddedChunk, RetrievalResult, SearchResult, StoredChunk};
pub use embedding::{EmbeddingClient, EmbeddingProvider};
pub use error::{ErrorKind, RagError, Result};
pub use generation::{GenerationClient, GenerationProvider};
pub use inmemory::InMemoryVectorStore;
#[cfg(feature = "pgvector")]
pub use pgvector::PgVectorStore;
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::{PromptTemplate, build_context, format_history};
pub use retriever::Retriever;
pub use retry::{RetryConfig, RetryPolicy};
pub use session::SessionManager;
pub use vectorstore::{VectorStore, cosine_distance};
