//! Deterministic providers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use pdfchat_rag::{
    EmbeddingProvider, GenerationProvider, InMemoryVectorStore, RagConfig, RagError, RagPipeline,
    Result,
};

/// Words the keyword embedder counts, one dimension each.
pub const VOCABULARY: [&str; 7] = ["sky", "blue", "grass", "green", "red", "cat", "dog"];

/// Vocabulary dimensions plus one constant bias component.
pub const DIMENSIONS: usize = VOCABULARY.len() + 1;

/// Bag-of-words embedder over [`VOCABULARY`].
///
/// The last component is always 1.0, so no text embeds to the zero vector.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicU32,
    fail_remaining: AtomicU32,
}

impl KeywordEmbedder {
    /// Fail the next `n` batch calls with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMENSIONS];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let word = word.to_lowercase();
            if let Some(i) = VOCABULARY.iter().position(|k| *k == word) {
                v[i] += 1.0;
            }
        }
        v[DIMENSIONS - 1] = 1.0;
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remaining.load(Ordering::SeqCst) > 0 {
            self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(RagError::embedding_transient("keyword", "503 service unavailable"));
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Records every prompt and answers `"answer #n"`, or fails when told to.
#[derive(Default)]
pub struct MockModel {
    pub prompts: Mutex<Vec<String>>,
    fail_remaining: AtomicU32,
}

impl MockModel {
    /// Fail the next `n` calls with a fatal error.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationProvider for MockModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        if self.fail_remaining.load(Ordering::SeqCst) > 0 {
            self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            return Err(RagError::generation_fatal("mock", "400 invalid argument"));
        }
        Ok(format!("answer #{}", prompts.len()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Everything a test needs to drive a pipeline and inspect its parts.
pub struct Harness {
    pub pipeline: RagPipeline,
    pub store: Arc<InMemoryVectorStore>,
    pub embedder: Arc<KeywordEmbedder>,
    pub model: Arc<MockModel>,
}

/// Build a pipeline over an in-memory store with the mock providers.
///
/// `config.dimensions` is overridden to [`DIMENSIONS`].
pub fn harness(config: RagConfig) -> Harness {
    let config = RagConfig { dimensions: DIMENSIONS, ..config };
    let store = Arc::new(InMemoryVectorStore::new(DIMENSIONS));
    let embedder = Arc::new(KeywordEmbedder::default());
    let model = Arc::new(MockModel::default());

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder.clone())
        .vector_store(store.clone())
        .generation_provider(model.clone())
        .build()
        .unwrap();

    Harness { pipeline, store, embedder, model }
}
