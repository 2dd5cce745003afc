//! OpenAI Chat Completions provider

use crate::http::{check_status, parse_json, transport_error};
use async_trait::async_trait;
use serde::Deserialize;
use shelfmark_core::{
    Completion, CompletionProvider, CompletionRequest, LlmError, LlmResult, TokenUsage,
};
use std::time::Duration;

/// OpenAI chat provider
pub struct OpenAIChatProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAIChatProvider {
    /// Create a new OpenAI provider
    pub fn new(api_key: String, base_url: Option<String>, model: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Request body for one user prompt.
    ///
    /// Reasoning-model families reject `max_tokens` and take
    /// `max_completion_tokens` instead.
    pub(crate) fn request_body(model: &str, prompt: &str, max_tokens: u32) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
        });
        let token_key = if uses_completion_token_param(model) {
            "max_completion_tokens"
        } else {
            "max_tokens"
        };
        body[token_key] = serde_json::json!(max_tokens);
        body
    }
}

fn uses_completion_token_param(model: &str) -> bool {
    model.starts_with("gpt-5") || model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4")
}

#[async_trait]
impl CompletionProvider for OpenAIChatProvider {
    async fn complete(&self, request: CompletionRequest) -> LlmResult<Completion> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&Self::request_body(&self.model, &request.prompt, request.max_tokens))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        let response = check_status("OpenAI", response).await?;
        let chat: ChatResponse = parse_json("OpenAI", response).await?;
        chat.into_completion()
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ChatResponse {
    pub(crate) fn into_completion(self) -> LlmResult<Completion> {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| LlmError::MalformedResponse("No choices in response".to_string()))?;

        let usage = self.usage.unwrap_or_default();
        Ok(Completion {
            text,
            model: self.model,
            usage: TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_request_body_token_parameter() {
        let legacy = OpenAIChatProvider::request_body("gpt-4o", "hi", 10);
        assert_eq!(legacy["max_tokens"], 10);
        assert!(legacy.get("max_completion_tokens").is_none());

        let reasoning = OpenAIChatProvider::request_body("gpt-5", "hi", 10);
        assert_eq!(reasoning["max_completion_tokens"], 10);
        assert!(reasoning.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_complete_parses_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"ok\":true}"}}],
                "usage": {"prompt_tokens": 20, "completion_tokens": 4, "total_tokens": 24}
            })))
            .mount(&server)
            .await;

        let provider = OpenAIChatProvider::new("sk-test".into(), Some(server.uri()), "gpt-4o".into(), 5);
        let completion = provider.complete(CompletionRequest::new("hi", 16)).await.unwrap();

        assert_eq!(completion.text, "{\"ok\":true}");
        assert_eq!(completion.usage.input_tokens, 20);
        assert_eq!(completion.usage.output_tokens, 4);
    }

    #[tokio::test]
    async fn test_empty_choices_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-4o",
                "choices": []
            })))
            .mount(&server)
            .await;

        let provider = OpenAIChatProvider::new("k".into(), Some(server.uri()), "gpt-4o".into(), 5);
        let err = provider.complete(CompletionRequest::new("hi", 16)).await.unwrap_err();
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn test_rate_limit_without_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = OpenAIChatProvider::new("k".into(), Some(server.uri()), "gpt-4o".into(), 5);
        let err = provider.complete(CompletionRequest::new("hi", 16)).await.unwrap_err();
        assert_eq!(err, LlmError::RateLimited { retry_after: None });
    }
}
