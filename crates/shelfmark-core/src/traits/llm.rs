//! Language-model capability boundary
//!
//! "Submit a text prompt, receive text back with usage, or fail with a
//! classified error." Embeddings are a separate capability because the
//! embedding vendor can differ from the completion vendor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classified failure of a model call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited by provider (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse(_))
    }
}

/// Result type for model calls
pub type LlmResult<T> = Result<T, LlmError>;

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Saturates at `u32::MAX`
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// A single-prompt completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

/// Text returned by a completion call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: TokenUsage,
}

/// Text completion capability
///
/// Implementations must be provider-agnostic from the caller's point of view:
/// one prompt in, one text out. Vendor wire formats stay inside the
/// implementation.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Submit one prompt and wait for the full response
    async fn complete(&self, request: CompletionRequest) -> LlmResult<Completion>;

    /// Short provider identifier recorded in caches, e.g. `anthropic`
    fn provider_name(&self) -> &str;

    /// Model identifier recorded in caches
    fn model_name(&self) -> &str;
}

/// Text embedding capability
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts; output order matches input order
    async fn embed_batch(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>>;

    /// Embedding model identifier; an index built with another model is stale
    fn model_name(&self) -> &str;

    /// Embed a single text
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedResponse("empty embedding response".to_string()))
    }
}
