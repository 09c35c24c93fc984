//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: fixed character windows with a constant overlap
//! - [`SeparatorChunker`]: splits on a separator (a newline by default) and
//!   merges the pieces back up to the chunk size, carrying trailing pieces
//!   over as overlap
//!
//! Sizes are counted in characters, never bytes, so multi-byte text is never
//! cut inside a UTF-8 sequence.

use std::collections::VecDeque;

use tracing::warn;

use crate::config::validate_chunking;
use crate::document::{Chunk, Document};
use crate::error::Result;

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, in source order.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Wrap raw chunk texts into [`Chunk`]s numbered in order.
fn into_chunks(document: &Document, texts: Vec<String>) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(sequence_index, text)| {
            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), sequence_index.to_string());
            if let Some(uri) = &document.source_uri {
                metadata.insert("source_uri".to_string(), uri.clone());
            }
            Chunk {
                id: format!("{}_{sequence_index}", document.id),
                text,
                document_id: document.id.clone(),
                sequence_index,
                metadata,
            }
        })
        .collect()
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Each window starts `chunk_size - chunk_overlap` characters after the
/// previous one. The window that reaches the end of the text is the last, and
/// may be shorter than `chunk_size`.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) unless
    /// `chunk_size > 0` and `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Split raw text into overlapping windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every character boundary, including the end of text.
        let boundaries: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let char_count = boundaries.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(char_count);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            if end == char_count {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        into_chunks(document, self.split_text(&document.text))
    }
}

/// Rebuild the source text from [`FixedSizeChunker`] output.
///
/// Chunks must belong to one document and be in `sequence_index` order; the
/// first `overlap` characters of every chunk after the first are dropped.
pub fn merge_chunks(chunks: &[Chunk], overlap: usize) -> String {
    let mut text = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            text.push_str(&chunk.text);
        } else {
            text.extend(chunk.text.chars().skip(overlap));
        }
    }
    text
}

/// Splits text on a separator and merges the pieces into chunks.
///
/// Pieces are joined back with the separator until adding the next one would
/// exceed `chunk_size`. When a chunk is emitted, its trailing pieces that fit
/// within `chunk_overlap` start the next chunk. A single piece longer than
/// `chunk_size` becomes its own chunk.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::SeparatorChunker;
///
/// let chunker = SeparatorChunker::new(1000, 200)?.with_separator("\n\n");
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct SeparatorChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl SeparatorChunker {
    /// Create a new `SeparatorChunker` splitting on newlines.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) unless
    /// `chunk_size > 0` and `chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap, separator: "\n".to_string() })
    }

    /// Use a different separator. An empty separator falls back to `"\n"`.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        if !separator.is_empty() {
            self.separator = separator;
        }
        self
    }

    /// Split raw text into merged chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separator_len = char_len(&self.separator);
        let pieces = text.split(self.separator.as_str()).filter(|p| !p.trim().is_empty());

        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = |w: &VecDeque<&str>| if w.is_empty() { 0 } else { separator_len };

            if total + len + joiner(&window) > self.chunk_size && !window.is_empty() {
                self.emit(&window, &mut chunks);
                while total > self.chunk_overlap
                    || (total > 0 && total + len + joiner(&window) > self.chunk_size)
                {
                    let Some(first) = window.pop_front() else { break };
                    total -= char_len(first) + joiner(&window);
                }
            }

            total += len + joiner(&window);
            window.push_back(piece);
        }

        if !window.is_empty() {
            self.emit(&window, &mut chunks);
        }
        chunks
    }

    fn emit(&self, window: &VecDeque<&str>, chunks: &mut Vec<String>) {
        let joined = window.iter().copied().collect::<Vec<_>>().join(&self.separator);
        let trimmed = joined.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }
}

impl Chunker for SeparatorChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let texts = self.split_text(&document.text);
        for (sequence_index, text) in texts.iter().enumerate() {
            let len = char_len(text);
            if len > self.chunk_size {
                warn!(
                    document.id = %document.id,
                    sequence_index,
                    len,
                    chunk_size = self.chunk_size,
                    "chunk exceeds chunk_size; no separator inside it"
                );
            }
        }
        into_chunks(document, texts)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
