//! Embedding provider for OpenAI-compatible `/embeddings` endpoints.
//!
//! The default target is a local text-embeddings server hosting
//! `sentence-transformers/all-MiniLM-L6-v2`, which produces 384-dimension
//! vectors. Any server speaking the OpenAI embeddings wire format works,
//! including OpenAI itself with `text-embedding-3-small` and `dimensions: 384`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::DEFAULT_DIMENSIONS;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::http::{HttpOptions, JsonClient, SendError, endpoint};

/// The default embeddings base URL (a local OpenAI-compatible server).
pub const DEFAULT_EMBEDDINGS_BASE_URL: &str = "http://127.0.0.1:8080/v1";

/// The default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// The default maximum number of inputs per request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

const PROVIDER: &str = "OpenAI-compatible";

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// # Configuration
///
/// - `base_url` – defaults to [`DEFAULT_EMBEDDINGS_BASE_URL`].
/// - `model` – defaults to [`DEFAULT_EMBEDDING_MODEL`].
/// - `dimensions` – defaults to 384. [`with_request_dimensions`](Self::with_request_dimensions)
///   also sends it to the API for models that support truncation.
/// - `api_key` – optional; sent as a bearer token when present.
///
/// # Example
///
/// ```rust,ignore
/// use docreader_rag::openai::OpenAiEmbeddingProvider;
///
/// let provider = OpenAiEmbeddingProvider::new("http://127.0.0.1:8080/v1", None, Default::default())?;
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingProvider {
    client: JsonClient,
    url: String,
    model: String,
    dimensions: usize,
    request_dimensions: bool,
    batch_size: usize,
}

impl OpenAiEmbeddingProvider {
    /// Create a new provider for `base_url` using the default model.
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: Option<String>,
        options: HttpOptions,
    ) -> Result<Self> {
        let client = JsonClient::new(api_key, options).map_err(|e| RagError::Embedding {
            provider: PROVIDER.into(),
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self {
            client,
            url: endpoint(base_url.as_ref(), "embeddings"),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: false,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the expected output dimensionality.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// Ask the API to truncate embeddings to [`dimensions`](EmbeddingProvider::dimensions).
    pub fn with_request_dimensions(mut self, enabled: bool) -> Self {
        self.request_dimensions = enabled;
        self
    }

    /// Set the maximum number of inputs sent per request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn error(&self, message: impl Into<String>) -> RagError {
        RagError::Embedding { provider: PROVIDER.into(), message: message.into() }
    }

    async fn embed_request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.request_dimensions.then_some(self.dimensions),
        };

        let response = self.client.post_json(&self.url, &request_body).await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "embedding request failed");
            match e {
                SendError::Timeout => {
                    RagError::Timeout { stage: "embedding", timeout: self.client.timeout() }
                }
                other => self.error(other.to_string()),
            }
        })?;

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            self.error(format!("failed to parse response: {e}"))
        })?;

        if parsed.data.len() != inputs.len() {
            return Err(self.error(format!(
                "API returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.iter().enumerate().any(|(position, entry)| entry.index != position) {
            error!(provider = PROVIDER, "embedding indices do not cover the batch");
            return Err(self.error("API returned out-of-order or duplicate embedding indices"));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| self.error("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_request(batch).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
