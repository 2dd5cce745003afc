//! OpenAI Batch API backend
//!
//! Sub-requests are uploaded as a JSONL file, the job is created against
//! `/v1/chat/completions`, and results are read back from the output and
//! error files.

use crate::completion::openai::{ChatResponse, OpenAIChatProvider};
use crate::http::{check_status, parse_json, parse_jsonl, transport_error, JsonlLine};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use shelfmark_core::{
    BackendStatus, BatchBackend, BatchRequest, BatchResultItem, BatchSnapshot, LlmError,
    LlmResult, RequestCounts, SubRequestOutcome,
};
use std::time::Duration;
use tracing::{debug, info};

const CHAT_ENDPOINT: &str = "/v1/chat/completions";

/// OpenAI batch client
pub struct OpenAIBatchBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    completion_window: String,
    timeout: Duration,
}

impl OpenAIBatchBackend {
    /// Create a new batch backend
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        completion_window: String,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model,
            completion_window,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn input_jsonl(&self, requests: &[BatchRequest]) -> LlmResult<String> {
        let mut out = String::new();
        for request in requests {
            let line = serde_json::json!({
                "custom_id": request.correlation_id,
                "method": "POST",
                "url": CHAT_ENDPOINT,
                "body": OpenAIChatProvider::request_body(&self.model, &request.prompt, request.max_tokens),
            });
            let line = serde_json::to_string(&line)
                .map_err(|e| LlmError::Config(format!("cannot encode batch line: {e}")))?;
            out.push_str(&line);
            out.push('\n');
        }
        Ok(out)
    }

    async fn upload(&self, jsonl: String) -> LlmResult<String> {
        let part = Part::bytes(jsonl.into_bytes())
            .file_name("batch.jsonl")
            .mime_str("application/jsonl")
            .map_err(|e| transport_error("OpenAI", e))?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;
        let response = check_status("OpenAI", response).await?;
        let file: FileObject = parse_json("OpenAI", response).await?;
        Ok(file.id)
    }

    async fn batch_info(&self, job_id: &str) -> LlmResult<BatchObject> {
        let response = self
            .client
            .get(format!("{}/batches/{job_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;
        let response = check_status("OpenAI", response).await?;
        parse_json("OpenAI", response).await
    }

    async fn file_lines(&self, file_id: &str) -> LlmResult<Vec<JsonlLine<OutputLine>>> {
        let response = self
            .client
            .get(format!("{}/files/{file_id}/content", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;
        let response = check_status("OpenAI", response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;
        Ok(parse_jsonl("OpenAI", &body))
    }
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    request_counts: Option<Counts>,
    #[serde(default)]
    output_file_id: Option<String>,
    #[serde(default)]
    error_file_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Counts {
    total: u32,
    completed: u32,
    failed: u32,
}

impl From<Counts> for RequestCounts {
    fn from(counts: Counts) -> Self {
        RequestCounts {
            processing: counts
                .total
                .saturating_sub(counts.completed)
                .saturating_sub(counts.failed),
            succeeded: counts.completed,
            errored: counts.failed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OutputLine {
    custom_id: String,
    #[serde(default)]
    response: Option<OutputResponse>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OutputResponse {
    status_code: u16,
    body: serde_json::Value,
}

fn status_of(status: &str) -> BackendStatus {
    match status {
        "validating" | "in_progress" | "finalizing" => BackendStatus::InProgress,
        "completed" => BackendStatus::Ended,
        other => BackendStatus::Failed(format!("batch is {other}")),
    }
}

fn outcome_of(line: OutputLine) -> SubRequestOutcome {
    if let Some(error) = line.error.filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return SubRequestOutcome::Errored(message);
    }

    match line.response {
        Some(response) if response.status_code == 200 => {
            match serde_json::from_value::<ChatResponse>(response.body)
                .map_err(|e| LlmError::MalformedResponse(e.to_string()))
                .and_then(ChatResponse::into_completion)
            {
                Ok(completion) => SubRequestOutcome::Succeeded(completion),
                Err(e) => SubRequestOutcome::Errored(e.to_string()),
            }
        }
        Some(response) => SubRequestOutcome::Errored(format!("status {}", response.status_code)),
        None => SubRequestOutcome::Errored("no response".to_string()),
    }
}

#[async_trait]
impl BatchBackend for OpenAIBatchBackend {
    async fn submit(&self, requests: &[BatchRequest]) -> LlmResult<String> {
        let file_id = self.upload(self.input_jsonl(requests)?).await?;
        debug!(%file_id, "Uploaded batch input file");

        let response = self
            .client
            .post(format!("{}/batches", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "input_file_id": file_id,
                "endpoint": CHAT_ENDPOINT,
                "completion_window": self.completion_window,
            }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;
        let response = check_status("OpenAI", response).await?;
        let batch: BatchObject = parse_json("OpenAI", response).await?;

        info!(job_id = %batch.id, requests = requests.len(), "Submitted OpenAI batch");
        Ok(batch.id)
    }

    async fn poll(&self, job_id: &str) -> LlmResult<BatchSnapshot> {
        let batch = self.batch_info(job_id).await?;
        debug!(job_id, status = %batch.status, "Polled OpenAI batch");
        Ok(BatchSnapshot {
            status: status_of(&batch.status),
            counts: batch.request_counts.unwrap_or_default().into(),
        })
    }

    async fn results(&self, job_id: &str) -> LlmResult<Vec<BatchResultItem>> {
        let batch = self.batch_info(job_id).await?;

        let mut lines = Vec::new();
        for file_id in [batch.output_file_id, batch.error_file_id].into_iter().flatten() {
            lines.extend(self.file_lines(&file_id).await?);
        }

        Ok(lines
            .into_iter()
            .map(|line| match line {
                JsonlLine::Parsed(line) => BatchResultItem {
                    correlation_id: line.custom_id.clone(),
                    outcome: outcome_of(line),
                },
                JsonlLine::Unreadable { custom_id, error } => BatchResultItem {
                    correlation_id: custom_id,
                    outcome: SubRequestOutcome::Errored(error),
                },
            })
            .collect())
    }

    fn backend_name(&self) -> &str {
        "openai"
    }
}
