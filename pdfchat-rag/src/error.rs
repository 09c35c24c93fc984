//! Error types for the `pdfchat-rag` crate.

use std::fmt;

use thiserror::Error;

/// Whether a service failure may succeed if the request is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failures, timeouts, rate limits and server-side errors.
    Transient,
    /// Authentication, validation and malformed responses.
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Fatal => write!(f, "fatal"),
        }
    }
}

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Caller misuse: invalid chunk size/overlap, `k`, dimensions or input.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}, {kind}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether the failure is worth retrying.
        kind: ErrorKind,
    },

    /// An error occurred while generating an answer.
    #[error("Generation error ({provider}, {kind}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
        /// Whether the failure is worth retrying.
        kind: ErrorKind,
    },

    /// An embedding did not have the configured dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The configured dimension.
        expected: usize,
        /// The dimension actually received.
        actual: usize,
    },

    /// The vector store schema does not match what this store expects.
    #[error("Vector store schema error ({backend}): {message}")]
    StoreSchemaError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store could not be reached.
    #[error("Vector store unavailable ({backend}): {message}")]
    StoreUnavailable {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    /// Build a transient [`RagError::EmbeddingError`].
    pub fn embedding_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError {
            provider: provider.into(),
            message: message.into(),
            kind: ErrorKind::Transient,
        }
    }

    /// Build a fatal [`RagError::EmbeddingError`].
    pub fn embedding_fatal(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError {
            provider: provider.into(),
            message: message.into(),
            kind: ErrorKind::Fatal,
        }
    }

    /// Build a transient [`RagError::GenerationError`].
    pub fn generation_transient(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationError {
            provider: provider.into(),
            message: message.into(),
            kind: ErrorKind::Transient,
        }
    }

    /// Build a fatal [`RagError::GenerationError`].
    pub fn generation_fatal(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationError {
            provider: provider.into(),
            message: message.into(),
            kind: ErrorKind::Fatal,
        }
    }

    /// Returns `true` for failures that a [`RetryPolicy`](crate::RetryPolicy)
    /// should repeat.
    pub fn is_retryable(&self) -> bool {
        match self {
            RagError::EmbeddingError { kind, .. } | RagError::GenerationError { kind, .. } => {
                *kind == ErrorKind::Transient
            }
            RagError::StoreUnavailable { .. } => true,
            RagError::ConfigError(_)
            | RagError::DimensionMismatch { .. }
            | RagError::StoreSchemaError { .. } => false,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
