//! Anthropic Message Batches backend

use crate::completion::anthropic::{AnthropicProvider, MessageResponse, ANTHROPIC_VERSION};
use crate::http::{check_status, parse_json, parse_jsonl, transport_error, JsonlLine};
use async_trait::async_trait;
use serde::Deserialize;
use shelfmark_core::{
    BackendStatus, BatchBackend, BatchRequest, BatchResultItem, BatchSnapshot, LlmResult,
    RequestCounts, SubRequestOutcome,
};
use std::time::Duration;
use tracing::{debug, info};

/// Message Batches client
pub struct AnthropicBatchBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl AnthropicBatchBackend {
    /// Create a new batch backend
    pub fn new(api_key: String, base_url: Option<String>, model: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com/v1".to_string()),
            model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.timeout)
    }
}

#[derive(Debug, Deserialize)]
struct BatchInfo {
    id: String,
    processing_status: String,
    #[serde(default)]
    request_counts: Counts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Counts {
    processing: u32,
    succeeded: u32,
    errored: u32,
    canceled: u32,
    expired: u32,
}

impl From<Counts> for RequestCounts {
    fn from(counts: Counts) -> Self {
        RequestCounts {
            processing: counts.processing,
            succeeded: counts.succeeded,
            errored: counts.errored + counts.canceled + counts.expired,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResultLine {
    custom_id: String,
    result: ResultBody,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResultBody {
    Succeeded { message: MessageResponse },
    Errored { error: serde_json::Value },
    Canceled,
    Expired,
}

fn status_of(processing_status: &str) -> BackendStatus {
    match processing_status {
        "in_progress" => BackendStatus::InProgress,
        "ended" => BackendStatus::Ended,
        other => BackendStatus::Failed(format!("batch is {other}")),
    }
}

fn error_message(error: &serde_json::Value) -> String {
    error
        .pointer("/error/message")
        .or_else(|| error.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

fn outcome_of(result: ResultBody) -> SubRequestOutcome {
    match result {
        ResultBody::Succeeded { message } => match message.into_completion() {
            Ok(completion) => SubRequestOutcome::Succeeded(completion),
            Err(e) => SubRequestOutcome::Errored(e.to_string()),
        },
        ResultBody::Errored { error } => SubRequestOutcome::Errored(error_message(&error)),
        ResultBody::Canceled => SubRequestOutcome::Errored("canceled".to_string()),
        ResultBody::Expired => SubRequestOutcome::Errored("expired".to_string()),
    }
}

#[async_trait]
impl BatchBackend for AnthropicBatchBackend {
    async fn submit(&self, requests: &[BatchRequest]) -> LlmResult<String> {
        let body = serde_json::json!({
            "requests": requests
                .iter()
                .map(|r| serde_json::json!({
                    "custom_id": r.correlation_id,
                    "params": AnthropicProvider::request_body(&self.model, &r.prompt, r.max_tokens),
                }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(format!("{}/messages/batches", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;
        let response = check_status("Anthropic", response).await?;
        let info: BatchInfo = parse_json("Anthropic", response).await?;

        info!(job_id = %info.id, requests = requests.len(), "Submitted Anthropic batch");
        Ok(info.id)
    }

    async fn poll(&self, job_id: &str) -> LlmResult<BatchSnapshot> {
        let response = self
            .get(format!("{}/messages/batches/{job_id}", self.base_url))
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;
        let response = check_status("Anthropic", response).await?;
        let info: BatchInfo = parse_json("Anthropic", response).await?;

        debug!(job_id, status = %info.processing_status, "Polled Anthropic batch");
        Ok(BatchSnapshot {
            status: status_of(&info.processing_status),
            counts: info.request_counts.into(),
        })
    }

    async fn results(&self, job_id: &str) -> LlmResult<Vec<BatchResultItem>> {
        let response = self
            .get(format!("{}/messages/batches/{job_id}/results", self.base_url))
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;
        let response = check_status("Anthropic", response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;

        Ok(parse_jsonl::<ResultLine>("Anthropic", &body)
            .into_iter()
            .map(|line| match line {
                JsonlLine::Parsed(line) => BatchResultItem {
                    correlation_id: line.custom_id,
                    outcome: outcome_of(line.result),
                },
                JsonlLine::Unreadable { custom_id, error } => BatchResultItem {
                    correlation_id: custom_id,
                    outcome: SubRequestOutcome::Errored(error),
                },
            })
            .collect())
    }

    fn backend_name(&self) -> &str {
        "anthropic"
    }
}
