//! Answer generation through a hosted chat-completion model.
//!
//! [`AnswerGenerator`] turns retrieved context plus a question into an
//! answer. [`ChatCompletionGenerator`] implements it against any
//! OpenAI-compatible `/chat/completions` endpoint; the defaults target Groq.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{RagError, Result};
use crate::http::{HttpOptions, JsonClient, SendError, endpoint};

/// Groq's OpenAI-compatible API base.
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// The default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "llama3-70b-8192";

/// Sampling temperature for every answer. Kept low to favor grounded answers.
pub const ANSWER_TEMPERATURE: f32 = 0.2;

/// Produces a natural-language answer from retrieved context and a question.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Answer `question` using `context`.
    ///
    /// An empty answer from the backend is an error, never a successful
    /// empty string.
    async fn generate(&self, context: &str, question: &str) -> Result<String>;

    /// Short provider name used in errors and logs.
    fn name(&self) -> &str;
}

/// Render the fixed prompt template with `context` and `question` verbatim.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the context below to answer accurately.\n\nContext:\n{context}\n\nQuestion:\n{question}\n"
    )
}

/// An [`AnswerGenerator`] backed by an OpenAI-compatible chat-completions API.
///
/// # Example
///
/// ```rust,ignore
/// use docreader_rag::generation::{ChatCompletionGenerator, GROQ_API_BASE};
///
/// let generator = ChatCompletionGenerator::new(GROQ_API_BASE, api_key, Default::default())?;
/// let answer = generator.generate("Rust has no GC.", "Does Rust use a GC?").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ChatCompletionGenerator {
    client: JsonClient,
    url: String,
    model: String,
    provider: String,
}

impl ChatCompletionGenerator {
    /// Create a generator for `base_url` using [`DEFAULT_CHAT_MODEL`].
    pub fn new(
        base_url: impl AsRef<str>,
        api_key: impl Into<String>,
        options: HttpOptions,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let provider = provider_name(base_url.as_ref());
        if api_key.trim().is_empty() {
            return Err(RagError::Generation { provider, message: "API key must not be empty".into() });
        }
        let client = JsonClient::new(Some(api_key), options).map_err(|e| RagError::Generation {
            provider: provider.clone(),
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self {
            client,
            url: endpoint(base_url.as_ref(), "chat/completions"),
            model: DEFAULT_CHAT_MODEL.into(),
            provider,
        })
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn error(&self, message: impl Into<String>) -> RagError {
        RagError::Generation { provider: self.provider.clone(), message: message.into() }
    }
}

fn provider_name(base_url: &str) -> String {
    if base_url.contains("groq.com") { "Groq".into() } else { "OpenAI-compatible".into() }
}

// ── Chat completions request/response types ───────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AnswerGenerator for ChatCompletionGenerator {
    async fn generate(&self, context: &str, question: &str) -> Result<String> {
        let prompt = build_prompt(context, question);
        debug!(provider = %self.provider, model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let request_body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: &prompt }],
            temperature: ANSWER_TEMPERATURE,
        };

        let response = self.client.post_json(&self.url, &request_body).await.map_err(|e| {
            error!(provider = %self.provider, error = %e, "completion request failed");
            match e {
                SendError::Timeout => {
                    RagError::Timeout { stage: "generation", timeout: self.client.timeout() }
                }
                other => self.error(other.to_string()),
            }
        })?;

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = %self.provider, error = %e, "failed to parse completion");
            self.error(format!("failed to parse response: {e}"))
        })?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| self.error("API returned no choices"))?
            .message
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| self.error("API returned an empty answer"))?;

        info!(provider = %self.provider, answer_len = answer.len(), "completion received");
        Ok(answer)
    }

    fn name(&self) -> &str {
        &self.provider
    }
}
