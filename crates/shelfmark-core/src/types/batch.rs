//! Batch job state machine
//!
//! A job moves `Submitted -> InProgress -> Completed | Failed`. Results are
//! keyed by correlation id, never by position, so a dropped or failed
//! sub-request cannot shift the alignment of the others.

use crate::traits::{Completion, RequestCounts};
use crate::ShelfmarkError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Lifecycle state of a batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_transition_to(self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (Self::Submitted, Self::InProgress)
                | (Self::Submitted, Self::Failed)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }
}

/// One sub-request of a batch, tagged with its correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub correlation_id: String,
    pub prompt: String,
    pub max_tokens: u32,
}

impl BatchRequest {
    pub fn new(correlation_id: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

/// Per-correlation-id result of a completed job
#[derive(Debug, Clone, PartialEq)]
pub enum SubRequestOutcome {
    Succeeded(Completion),
    /// The backend executed the sub-request and reported an error
    Errored(String),
    /// The backend returned no result for this correlation id
    Missing,
}

/// A batch job and everything known about it so far
#[derive(Debug, Clone)]
pub struct BatchJob {
    job_id: String,
    status: BatchStatus,
    requests: Vec<BatchRequest>,
    results: HashMap<String, SubRequestOutcome>,
    counts: RequestCounts,
    failure: Option<String>,
}

impl BatchJob {
    /// A job accepted by the backend under `job_id`
    pub fn submitted(job_id: impl Into<String>, requests: Vec<BatchRequest>) -> Self {
        Self {
            job_id: job_id.into(),
            status: BatchStatus::Submitted,
            requests,
            results: HashMap::new(),
            counts: RequestCounts::default(),
            failure: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn requests(&self) -> &[BatchRequest] {
        &self.requests
    }

    pub fn counts(&self) -> RequestCounts {
        self.counts
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn transition(&mut self, next: BatchStatus) -> Result<(), ShelfmarkError> {
        if !self.status.can_transition_to(next) {
            return Err(ShelfmarkError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `Submitted -> InProgress`
    pub fn start(&mut self) -> Result<(), ShelfmarkError> {
        self.transition(BatchStatus::InProgress)
    }

    /// Records the latest sub-request counters while in progress
    pub fn record_progress(&mut self, counts: RequestCounts) -> Result<(), ShelfmarkError> {
        if self.status != BatchStatus::InProgress {
            return Err(ShelfmarkError::InvalidTransition {
                from: self.status,
                to: BatchStatus::InProgress,
            });
        }
        self.counts = counts;
        Ok(())
    }

    /// `InProgress -> Completed`, storing results by correlation id.
    ///
    /// Every submitted correlation id ends up with an outcome; ids the backend
    /// did not return are recorded as `Missing`. Results for ids that were
    /// never submitted are dropped.
    pub fn complete(
        &mut self,
        results: impl IntoIterator<Item = (String, SubRequestOutcome)>,
    ) -> Result<(), ShelfmarkError> {
        self.transition(BatchStatus::Completed)?;

        for (correlation_id, outcome) in results {
            if self.requests.iter().any(|r| r.correlation_id == correlation_id) {
                self.results.insert(correlation_id, outcome);
            } else {
                warn!(job_id = %self.job_id, %correlation_id, "Dropping result for unknown correlation id");
            }
        }
        for request in &self.requests {
            self.results
                .entry(request.correlation_id.clone())
                .or_insert(SubRequestOutcome::Missing);
        }
        Ok(())
    }

    /// Moves the job to `Failed`
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), ShelfmarkError> {
        self.transition(BatchStatus::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }

    /// Outcome for a correlation id once the job has completed
    pub fn outcome(&self, correlation_id: &str) -> Option<&SubRequestOutcome> {
        self.results.get(correlation_id)
    }

    /// Removes and returns the outcome for a correlation id, `Missing` if none
    pub fn take_outcome(&mut self, correlation_id: &str) -> SubRequestOutcome {
        self.results
            .remove(correlation_id)
            .unwrap_or(SubRequestOutcome::Missing)
    }
}
