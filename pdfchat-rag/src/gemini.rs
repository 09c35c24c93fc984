//! Gemini embedding and generation providers over the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.
//!
//! Both providers share one `reqwest::Client` configuration: the API key is
//! sent in the `x-goog-api-key` header and every request carries
//! [`GeminiConfig::request_timeout`]. Failures are classified for the
//! [`RetryPolicy`](crate::RetryPolicy): HTTP 408, 429 and 5xx, timeouts and
//! connection failures are transient; every other status and any body that
//! cannot be decoded is fatal.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{ErrorKind, RagError, Result};
use crate::generation::GenerationProvider;

const PROVIDER: &str = "Gemini";

/// The default Generative Language API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Dimensionality of `text-embedding-004`.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

/// The default generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";

/// Most texts `batchEmbedContents` accepts in one request.
const MAX_BATCH: usize = 100;

/// Connection settings shared by the Gemini providers.
#[derive(Clone)]
pub struct GeminiConfig {
    /// Key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// API root, [`DEFAULT_BASE_URL`] unless overridden.
    pub base_url: String,
    /// Model used by [`GeminiEmbeddingProvider`].
    pub embedding_model: String,
    /// Model used by [`GeminiGenerationProvider`].
    pub generation_model: String,
    /// Sampling temperature for generation.
    pub temperature: f32,
    /// Limit on one HTTP request, including reading the body.
    pub request_timeout: Duration,
}

impl GeminiConfig {
    /// Create a config with default models and the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            temperature: 0.3,
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Read the API key from `GOOGLE_API_KEY`, falling back to `GEMINI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if neither variable holds a key.
    pub fn from_env() -> Result<Self> {
        let api_key = ["GOOGLE_API_KEY", "GEMINI_API_KEY"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| {
                RagError::ConfigError(
                    "GOOGLE_API_KEY (or GEMINI_API_KEY) environment variable not set".to_string(),
                )
            })?;
        Ok(Self::new(api_key))
    }

    /// Point the providers at another API root, such as a local proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the embedding model name.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Set the generation model name.
    pub fn with_generation_model(mut self, model: impl Into<String>) -> Self {
        self.generation_model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the per-request HTTP timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("generation_model", &self.generation_model)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Which service a failure is reported against.
#[derive(Debug, Clone, Copy)]
enum Service {
    Embedding,
    Generation,
}

impl Service {
    fn error(self, message: impl Into<String>, kind: ErrorKind) -> RagError {
        let (provider, message) = (PROVIDER.to_string(), message.into());
        match self {
            Service::Embedding => RagError::EmbeddingError { provider, message, kind },
            Service::Generation => RagError::GenerationError { provider, message, kind },
        }
    }
}

fn status_kind(status: StatusCode) -> ErrorKind {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ErrorKind::Transient
    } else {
        ErrorKind::Fatal
    }
}

fn transport_kind(err: &reqwest::Error) -> ErrorKind {
    if err.is_builder() || err.is_decode() { ErrorKind::Fatal } else { ErrorKind::Transient }
}

/// HTTP plumbing shared by both providers.
#[derive(Debug, Clone)]
struct GeminiHttp {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiHttp {
    fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".to_string()));
        }
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| RagError::ConfigError(format!("invalid Gemini API key: {e}")))?;
        let headers = HeaderMap::from_iter([(HeaderName::from_static("x-goog-api-key"), api_key)]);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RagError::ConfigError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn post_json<B, T>(&self, service: Service, url: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(url).json(body).send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            service.error(format!("request failed: {e}"), transport_kind(&e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            let message = format!("API returned {status}: {detail}");
            return Err(service.error(message, status_kind(status)));
        }

        let bytes = response.bytes().await.map_err(|e| {
            service.error(format!("failed to read response: {e}"), transport_kind(&e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            service.error(format!("failed to parse response: {e}"), ErrorKind::Fatal)
        })
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: [Part<'a>; 1],
}

/// How the embedded text will be used; Gemini tunes the vector accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Text stored for later retrieval.
    RetrievalDocument,
    /// A search query matched against stored documents.
    RetrievalQuery,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

// ── Providers ──────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by Gemini `batchEmbedContents`.
///
/// # Example
///
/// ```rust,ignore
/// use pdfchat_rag::gemini::{GeminiConfig, GeminiEmbeddingProvider};
///
/// let provider = GeminiEmbeddingProvider::new(GeminiConfig::from_env()?)?;
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingProvider {
    http: GeminiHttp,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Create a provider producing [`DEFAULT_EMBEDDING_DIMENSIONS`] vectors.
    ///
    /// Ingested text is embedded as [`TaskType::RetrievalDocument`] and
    /// questions as [`TaskType::RetrievalQuery`].
    pub fn new(config: GeminiConfig) -> Result<Self> {
        Ok(Self { http: GeminiHttp::new(config)?, dimensions: DEFAULT_EMBEDDING_DIMENSIONS })
    }

    /// Declare the dimensionality of a non-default embedding model.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    async fn embed_with_task(
        &self,
        texts: &[&str],
        task_type: TaskType,
    ) -> Result<Vec<Vec<f32>>> {
        let model = &self.http.config.embedding_model;
        let url = self.http.config.endpoint(model, "batchEmbedContents");
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(MAX_BATCH) {
            debug!(
                provider = PROVIDER,
                batch_size = batch.len(),
                %model,
                ?task_type,
                "embedding batch"
            );
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedRequest {
                        model: format!("models/{model}"),
                        content: Content { role: None, parts: [Part { text }] },
                        task_type,
                    })
                    .collect(),
            };
            let response: BatchEmbedResponse =
                self.http.post_json(Service::Embedding, &url, &request).await?;
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| {
            RagError::embedding_fatal(PROVIDER, "API returned an empty response")
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_task(texts, TaskType::RetrievalDocument).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_with_task(&[text], TaskType::RetrievalQuery).await?;
        results.into_iter().next().ok_or_else(|| {
            RagError::embedding_fatal(PROVIDER, "API returned an empty response")
        })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// A [`GenerationProvider`] backed by Gemini `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiGenerationProvider {
    http: GeminiHttp,
}

impl GeminiGenerationProvider {
    /// Create a provider for [`GeminiConfig::generation_model`].
    pub fn new(config: GeminiConfig) -> Result<Self> {
        Ok(Self { http: GeminiHttp::new(config)? })
    }
}

#[async_trait]
impl GenerationProvider for GeminiGenerationProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let config = &self.http.config;
        let url = config.endpoint(&config.generation_model, "generateContent");
        debug!(
            provider = PROVIDER,
            model = %config.generation_model,
            prompt_len = prompt.len(),
            "generating content"
        );

        let request = GenerateRequest {
            contents: [Content { role: Some("user"), parts: [Part { text: prompt }] }],
            generation_config: GenerationConfig { temperature: config.temperature },
        };
        let response: GenerateResponse =
            self.http.post_json(Service::Generation, &url, &request).await?;
        response
            .into_text()
            .ok_or_else(|| RagError::generation_fatal(PROVIDER, "response has no candidates"))
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        for code in [408, 429, 500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(status_kind(status), ErrorKind::Transient, "{code}");
        }
        for code in [400, 401, 403, 404] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(status_kind(status), ErrorKind::Fatal, "{code}");
        }
    }

    #[test]
    fn service_errors_carry_their_kind() {
        let err = Service::Embedding.error("503", ErrorKind::Transient);
        assert!(matches!(err, RagError::EmbeddingError { .. }));
        assert!(err.is_retryable());

        let err = Service::Generation.error("400", ErrorKind::Fatal);
        assert!(matches!(err, RagError::GenerationError { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn endpoint_joins_model_and_method() {
        let config = GeminiConfig::new("key").with_base_url("http://localhost:8080/v1beta/");
        assert_eq!(
            config.endpoint("text-embedding-004", "batchEmbedContents"),
            "http://localhost:8080/v1beta/models/text-embedding-004:batchEmbedContents"
        );
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = GeminiEmbeddingProvider::new(GeminiConfig::new("  ")).unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", GeminiConfig::new("secret-key"));
        assert!(!rendered.contains("secret-key"));
    }

    #[test]
    fn batch_embed_request_shape() {
        let request = BatchEmbedRequest {
            requests: vec![EmbedRequest {
                model: "models/text-embedding-004".to_string(),
                content: Content { role: None, parts: [Part { text: "hello" }] },
                task_type: TaskType::RetrievalDocument,
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "requests": [{
                    "model": "models/text-embedding-004",
                    "content": { "parts": [{ "text": "hello" }] },
                    "taskType": "RETRIEVAL_DOCUMENT"
                }]
            })
        );
    }

    #[test]
    fn query_task_type_is_serialized() {
        let request = EmbedRequest {
            model: "models/text-embedding-004".to_string(),
            content: Content { role: None, parts: [Part { text: "sky?" }] },
            task_type: TaskType::RetrievalQuery,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
    }

    #[test]
    fn generate_request_uses_camel_case() {
        let request = GenerateRequest {
            contents: [Content { role: Some("user"), parts: [Part { text: "hi" }] }],
            generation_config: GenerationConfig { temperature: 0.3 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn parses_embeddings_in_order() {
        let raw = r#"{"embeddings":[{"values":[0.1,0.2]},{"values":[0.3,0.4]}]}"#;
        let response: BatchEmbedResponse = serde_json::from_str(raw).unwrap();
        let vectors: Vec<_> = response.embeddings.into_iter().map(|e| e.values).collect();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn candidate_parts_are_concatenated() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"The sky "},{"text":"is blue."}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.into_text().as_deref(), Some("The sky is blue."));
    }

    #[test]
    fn missing_candidates_yield_nothing() {
        let response: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(response.into_text().is_none());

        let blocked = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let response: GenerateResponse = serde_json::from_str(blocked).unwrap();
        assert!(response.into_text().is_none());
    }

    #[test]
    fn error_body_message_is_extracted() {
        let raw = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.message, "API key not valid");
    }
}
