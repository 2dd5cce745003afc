//! OpenAI-compatible `/embeddings` provider

use crate::http::{check_status, parse_json, transport_error};
use async_trait::async_trait;
use serde::Deserialize;
use shelfmark_core::{EmbeddingProvider, LlmError, LlmResult};
use std::time::Duration;
use tracing::debug;

/// Embedding provider for OpenAI and compatible servers
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAIEmbeddingProvider {
    /// Create a new embedding provider
    pub fn new(api_key: String, base_url: Option<String>, model: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        let response = check_status("OpenAI", response).await?;
        let mut body: EmbeddingResponse = parse_json("OpenAI", response).await?;

        // Order by index; the API does not promise input order
        body.data.sort_by_key(|d| d.index);
        if body.data.len() != texts.len() {
            return Err(LlmError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.data.len()
            )));
        }
        debug!(count = texts.len(), model = %self.model, "Embedded batch");

        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
