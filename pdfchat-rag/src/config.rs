//! Configuration for the RAG pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryConfig;

/// How the pipeline splits documents when no chunker is supplied explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Fixed character windows, see [`FixedSizeChunker`](crate::FixedSizeChunker).
    Fixed,
    /// Separator-aware merging, see [`SeparatorChunker`](crate::SeparatorChunker).
    #[default]
    Separator,
}

/// Configuration parameters for the RAG pipeline.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunker built by the pipeline when none is supplied.
    pub chunking: ChunkingStrategy,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Embedding dimensionality, fixed for the lifetime of a store.
    pub dimensions: usize,
    /// Most recent conversation turns sent along with each question.
    pub history_turns: usize,
    /// Optional cosine-distance cutoff. `None` returns every top-k result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f32>,
    /// Retry settings applied to every external call.
    pub retry: RetryConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            chunking: ChunkingStrategy::default(),
            top_k: 5,
            dimensions: 768,
            history_turns: 10,
            max_distance: None,
            retry: RetryConfig::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: RagConfig = serde_json::from_str(raw)
            .map_err(|e| RagError::ConfigError(format!("invalid configuration JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `dimensions == 0`
    /// - `retry.max_attempts == 0` or `retry.attempt_timeout_ms == 0`
    /// - `max_distance` is negative or not finite
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.dimensions == 0 {
            return Err(RagError::ConfigError("dimensions must be greater than zero".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(RagError::ConfigError(
                "retry.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.retry.attempt_timeout_ms == 0 {
            return Err(RagError::ConfigError(
                "retry.attempt_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(max) = self.max_distance {
            if !max.is_finite() || max < 0.0 {
                return Err(RagError::ConfigError(format!(
                    "max_distance ({max}) must be a non-negative number"
                )));
            }
        }
        Ok(())
    }
}

/// Shared size/overlap validation used by the config and the chunkers.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the chunking strategy.
    pub fn chunking(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.chunking = strategy;
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the embedding dimensionality.
    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.config.dimensions = dimensions;
        self
    }

    /// Set how many recent turns accompany each question.
    pub fn history_turns(mut self, turns: usize) -> Self {
        self.config.history_turns = turns;
        self
    }

    /// Drop retrieved chunks farther than `distance` from the question.
    pub fn max_distance(mut self, distance: f32) -> Self {
        self.config.max_distance = Some(distance);
        self
    }

    /// Set the retry settings.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 200);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.dimensions, 768);
        assert_eq!(config.history_turns, 10);
        assert_eq!(config.max_distance, None);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(RagConfig::builder().chunk_size(0).chunk_overlap(0).build().is_err());
        assert!(RagConfig::builder().top_k(0).build().is_err());
        assert!(RagConfig::builder().dimensions(0).build().is_err());
        let retry = RetryConfig { max_attempts: 0, ..RetryConfig::default() };
        assert!(RagConfig::builder().retry(retry).build().is_err());
        let retry = RetryConfig { attempt_timeout_ms: 0, ..RetryConfig::default() };
        assert!(RagConfig::builder().retry(retry).build().is_err());
    }

    #[test]
    fn negative_max_distance_is_rejected() {
        assert!(RagConfig::builder().max_distance(-0.5).build().is_err());
        assert!(RagConfig::builder().max_distance(0.5).build().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            RagConfig::from_json_str(r#"{"chunk_size": 20, "chunk_overlap": 5, "chunking": "fixed"}"#)
                .unwrap();
        assert_eq!(config.chunk_size, 20);
        assert_eq!(config.chunk_overlap, 5);
        assert_eq!(config.chunking, ChunkingStrategy::Fixed);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let err = RagConfig::from_json_str(r#"{"chunk_size": 10, "chunk_overlap": 20}"#).unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
        assert!(RagConfig::from_json_str("not json").is_err());
    }
}
