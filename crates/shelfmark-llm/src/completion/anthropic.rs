//! Anthropic Messages API provider

use crate::http::{check_status, parse_json, transport_error};
use async_trait::async_trait;
use serde::Deserialize;
use shelfmark_core::{
    Completion, CompletionProvider, CompletionRequest, LlmError, LlmResult, TokenUsage,
};
use std::time::Duration;
use tracing::debug;

/// API version header sent with every request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic completion provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(api_key: String, base_url: Option<String>, model: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com/v1".to_string()),
            model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub(crate) fn request_body(model: &str, prompt: &str, max_tokens: u32) -> serde_json::Value {
        serde_json::json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        })
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> LlmResult<Completion> {
        let url = format!("{}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&Self::request_body(&self.model, &request.prompt, request.max_tokens))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;

        let response = check_status("Anthropic", response).await?;
        let message: MessageResponse = parse_json("Anthropic", response).await?;
        debug!(id = %message.id, stop_reason = ?message.stop_reason, "Anthropic message received");
        message.into_completion()
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    #[serde(default)]
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    usage: Usage,
}

impl MessageResponse {
    pub(crate) fn into_completion(self) -> LlmResult<Completion> {
        let text: String = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(LlmError::MalformedResponse(
                "Anthropic response contained no text blocks".to_string(),
            ));
        }

        Ok(Completion {
            text,
            model: self.model,
            usage: TokenUsage {
                input_tokens: self.usage.input_tokens,
                output_tokens: self.usage.output_tokens,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}
