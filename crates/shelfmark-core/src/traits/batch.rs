//! Batch backend capability boundary
//!
//! "Submit N correlated sub-requests as one job; poll job status; fetch
//! per-correlation-id results once terminal."

use super::llm::LlmResult;
use crate::types::{BatchRequest, SubRequestOutcome};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Status of a job as reported by the remote backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    /// Still running (including validating/finalizing phases)
    InProgress,
    /// Finished successfully; results can be fetched
    Ended,
    /// Terminal state other than success (expired, cancelled, failed)
    Failed(String),
}

/// Sub-request counters reported while a job runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    pub processing: u32,
    pub succeeded: u32,
    pub errored: u32,
}

/// One poll result
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSnapshot {
    pub status: BackendStatus,
    pub counts: RequestCounts,
}

/// Result for one correlation id
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResultItem {
    pub correlation_id: String,
    pub outcome: SubRequestOutcome,
}

/// Asynchronous bulk execution backend
#[async_trait]
pub trait BatchBackend: Send + Sync {
    /// Submit sub-requests as one job and return the backend job id
    async fn submit(&self, requests: &[BatchRequest]) -> LlmResult<String>;

    /// Current status of a job
    async fn poll(&self, job_id: &str) -> LlmResult<BatchSnapshot>;

    /// Per-correlation-id results of an ended job, in any order
    async fn results(&self, job_id: &str) -> LlmResult<Vec<BatchResultItem>>;

    /// Short backend identifier for logs
    fn backend_name(&self) -> &str;
}
