//! Environment-driven server configuration.
//!
//! Every setting has a default so the service starts with only an LLM API
//! key. Variables are read after `dotenvy` loads any `.env` file.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DOCREADER_HOST` | `127.0.0.1` |
//! | `DOCREADER_PORT` | `8000` |
//! | `DOCREADER_UPLOAD_DIR` | `data/uploaded_docs` |
//! | `DOCREADER_MAX_UPLOAD_BYTES` | 32 MiB |
//! | `DOCREADER_EMBEDDER` | `openai` (or `hash`) |
//! | `DOCREADER_EMBEDDINGS_URL` | `http://127.0.0.1:8080/v1` |
//! | `DOCREADER_EMBEDDINGS_MODEL` | `sentence-transformers/all-MiniLM-L6-v2` |
//! | `DOCREADER_EMBEDDINGS_API_KEY` | unset |
//! | `DOCREADER_LLM_URL` | `https://api.groq.com/openai/v1` |
//! | `DOCREADER_LLM_MODEL` | `llama3-70b-8192` |
//! | `DOCREADER_LLM_API_KEY` / `GROQ_API_KEY` | required |
//! | `DOCREADER_TIMEOUT_SECS` | `30` |
//! | `DOCREADER_MAX_RETRIES` | `2` |
//! | `DOCREADER_CHUNK_SIZE` | `500` |
//! | `DOCREADER_TOP_K` | `3` |
//! | `DOCREADER_DIMENSIONS` | `384` |

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use docreader_rag::generation::DEFAULT_CHAT_MODEL;
use docreader_rag::openai::{DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDINGS_BASE_URL};
use docreader_rag::{
    ChatCompletionGenerator, DocumentPipeline, EmbeddingProvider, ExtensionExtractor,
    GROQ_API_BASE, HashEmbeddingProvider, HttpOptions, InMemoryIndex, OpenAiEmbeddingProvider,
    RagConfig,
};

/// Which embedding backend the service uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderBackend {
    /// An OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
    /// The offline feature-hashing provider.
    Hash,
}

impl FromStr for EmbedderBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "hash" => Ok(Self::Hash),
            other => bail!("unknown embedder backend '{other}' (expected 'openai' or 'hash')"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub embedder: EmbedderBackend,
    pub embeddings_url: String,
    pub embeddings_model: String,
    pub embeddings_api_key: Option<String>,
    pub llm_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: usize,
    pub rag: RagConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            upload_dir: PathBuf::from("data/uploaded_docs"),
            max_upload_bytes: 32 * 1024 * 1024,
            embedder: EmbedderBackend::OpenAi,
            embeddings_url: DEFAULT_EMBEDDINGS_BASE_URL.to_string(),
            embeddings_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embeddings_api_key: None,
            llm_url: GROQ_API_BASE.to_string(),
            llm_model: DEFAULT_CHAT_MODEL.to_string(),
            llm_api_key: None,
            timeout: HttpOptions::default().timeout,
            max_retries: HttpOptions::default().max_retries,
            rag: RagConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Fails if a variable is set but does not parse, or if the resulting
    /// [`RagConfig`] is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let rag = RagConfig::builder()
            .chunk_size(parse_or(&var, "DOCREADER_CHUNK_SIZE", defaults.rag.chunk_size)?)
            .top_k(parse_or(&var, "DOCREADER_TOP_K", defaults.rag.top_k)?)
            .dimensions(parse_or(&var, "DOCREADER_DIMENSIONS", defaults.rag.dimensions)?)
            .build()
            .context("invalid retrieval settings")?;

        Ok(Self {
            host: var("DOCREADER_HOST").unwrap_or(defaults.host),
            port: parse_or(&var, "DOCREADER_PORT", defaults.port)?,
            upload_dir: var("DOCREADER_UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            max_upload_bytes: parse_or(&var, "DOCREADER_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            embedder: parse_or(&var, "DOCREADER_EMBEDDER", defaults.embedder)?,
            embeddings_url: var("DOCREADER_EMBEDDINGS_URL").unwrap_or(defaults.embeddings_url),
            embeddings_model: var("DOCREADER_EMBEDDINGS_MODEL").unwrap_or(defaults.embeddings_model),
            embeddings_api_key: var("DOCREADER_EMBEDDINGS_API_KEY"),
            llm_url: var("DOCREADER_LLM_URL").unwrap_or(defaults.llm_url),
            llm_model: var("DOCREADER_LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_api_key: var("DOCREADER_LLM_API_KEY").or_else(|| var("GROQ_API_KEY")),
            timeout: Duration::from_secs(parse_or(
                &var,
                "DOCREADER_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            max_retries: parse_or(&var, "DOCREADER_MAX_RETRIES", defaults.max_retries)?,
            rag,
        })
    }

    fn http_options(&self) -> HttpOptions {
        HttpOptions { timeout: self.timeout, max_retries: self.max_retries, ..HttpOptions::default() }
    }

    /// Assemble the document pipeline described by this configuration.
    pub fn build_pipeline(&self) -> anyhow::Result<DocumentPipeline> {
        let dimensions = self.rag.dimensions;
        let embedder: Arc<dyn EmbeddingProvider> = match self.embedder {
            EmbedderBackend::OpenAi => Arc::new(
                OpenAiEmbeddingProvider::new(
                    &self.embeddings_url,
                    self.embeddings_api_key.clone(),
                    self.http_options(),
                )?
                .with_model(&self.embeddings_model)
                .with_dimensions(dimensions),
            ),
            EmbedderBackend::Hash => Arc::new(HashEmbeddingProvider::new(dimensions)),
        };

        let api_key = self
            .llm_api_key
            .clone()
            .context("DOCREADER_LLM_API_KEY or GROQ_API_KEY must be set")?;
        let generator = ChatCompletionGenerator::new(&self.llm_url, api_key, self.http_options())?
            .with_model(&self.llm_model);

        let pipeline = DocumentPipeline::builder()
            .config(self.rag.clone())
            .extractor(Arc::new(ExtensionExtractor::new()))
            .embedding_provider(embedder)
            .index(Arc::new(InMemoryIndex::new(dimensions)))
            .generator(Arc::new(generator))
            .build()?;
        Ok(pipeline)
    }
}

fn parse_or<T>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e| anyhow::anyhow!("invalid {key}='{raw}': {e}")),
        None => Ok(default),
    }
}
