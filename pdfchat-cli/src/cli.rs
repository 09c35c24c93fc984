//! Command-line arguments and their merge into [`RagConfig`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use pdfchat_rag::pgvector::DEFAULT_TABLE;
use pdfchat_rag::{ChunkingStrategy, RagConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Chunking {
    Fixed,
    Separator,
}

impl From<Chunking> for ChunkingStrategy {
    fn from(value: Chunking) -> Self {
        match value {
            Chunking::Fixed => ChunkingStrategy::Fixed,
            Chunking::Separator => ChunkingStrategy::Separator,
        }
    }
}

/// Chat with the extracted text of PDF documents.
///
/// Text files given as arguments are ingested before the prompt opens.
/// GOOGLE_API_KEY must be set. When DATABASE_URL (or --database-url) is set,
/// chunks are stored in PostgreSQL with pgvector; otherwise they live in
/// memory for the duration of the session.
#[derive(Debug, Parser)]
#[command(name = "pdfchat", version, about)]
pub struct Cli {
    /// Text files (already extracted from PDFs) to ingest.
    pub files: Vec<PathBuf>,

    /// JSON configuration file; flags below override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Replace everything already stored with the given files.
    #[arg(long)]
    pub replace: bool,

    /// Ask one question, print the answer and exit.
    #[arg(short, long)]
    pub ask: Option<String>,

    #[arg(long)]
    pub chunk_size: Option<usize>,

    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    #[arg(long, value_enum)]
    pub chunking: Option<Chunking>,

    /// Chunks retrieved per question.
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Previous turns sent with each question.
    #[arg(long)]
    pub history_turns: Option<usize>,

    /// Drop retrieved chunks farther than this cosine distance.
    #[arg(long)]
    pub max_distance: Option<f32>,

    /// PostgreSQL connection string (defaults to $DATABASE_URL).
    #[arg(long)]
    pub database_url: Option<String>,

    /// pgvector table name.
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,

    #[arg(long)]
    pub embedding_model: Option<String>,

    #[arg(long)]
    pub generation_model: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Load the config file (or defaults), apply flag overrides and validate.
    pub fn rag_config(&self) -> anyhow::Result<RagConfig> {
        let mut config = match &self.config {
            Some(path) => RagConfig::from_json_file(path)?,
            None => RagConfig::default(),
        };

        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(overlap) = self.chunk_overlap {
            config.chunk_overlap = overlap;
        }
        if let Some(chunking) = self.chunking {
            config.chunking = chunking.into();
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
        if let Some(turns) = self.history_turns {
            config.history_turns = turns;
        }
        if self.max_distance.is_some() {
            config.max_distance = self.max_distance;
        }

        config.validate()?;
        Ok(config)
    }

    /// The database URL from the flag, then the environment.
    pub fn database_url(&self) -> Option<String> {
        self.database_url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .filter(|url| !url.trim().is_empty())
    }
}
