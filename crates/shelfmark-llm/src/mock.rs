//! Deterministic in-memory providers for tests
//!
//! None of these touch the network. Enable the `test-utils` feature to use
//! them from other crates' tests.

use async_trait::async_trait;
use shelfmark_core::{
    BackendStatus, BatchBackend, BatchRequest, BatchResultItem, BatchSnapshot, Completion,
    CompletionProvider, CompletionRequest, EmbeddingProvider, LlmError, LlmResult, RequestCounts,
    SubRequestOutcome, TokenUsage,
};
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

/// Scripted completion provider
///
/// Answers come from, in order: the FIFO queue, the first substring rule that
/// matches the prompt, then the default response.
pub struct MockCompletionProvider {
    model_name: String,
    queue: Mutex<VecDeque<LlmResult<String>>>,
    rules: Mutex<Vec<(String, LlmResult<String>)>>,
    default_response: Mutex<LlmResult<String>>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockCompletionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCompletionProvider {
    /// Create a provider answering `"mock response"` to everything
    pub fn new() -> Self {
        Self::with_model("mock-model")
    }

    /// Create a provider reporting a custom model name
    pub fn with_model(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            queue: Mutex::new(VecDeque::new()),
            rules: Mutex::new(Vec::new()),
            default_response: Mutex::new(Ok("mock response".to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue one response for the next call
    pub fn push_response(&self, text: impl Into<String>) {
        self.queue.lock().unwrap().push_back(Ok(text.into()));
    }

    /// Queue one failure for the next call
    pub fn push_error(&self, error: LlmError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    /// Answer any prompt containing `needle` with `text`
    pub fn respond_to(&self, needle: impl Into<String>, text: impl Into<String>) {
        self.rules
            .lock()
            .unwrap()
            .push((needle.into(), Ok(text.into())));
    }

    /// Fail any prompt containing `needle`
    pub fn fail_on(&self, needle: impl Into<String>, error: LlmError) {
        self.rules.lock().unwrap().push((needle.into(), Err(error)));
    }

    /// Response used when nothing else matches
    pub fn set_default_response(&self, text: impl Into<String>) {
        *self.default_response.lock().unwrap() = Ok(text.into());
    }

    /// Prompts received so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn answer(&self, prompt: &str) -> LlmResult<String> {
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            return next;
        }
        let rules = self.rules.lock().unwrap();
        if let Some((_, answer)) = rules.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            return answer.clone();
        }
        self.default_response.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, request: CompletionRequest) -> LlmResult<Completion> {
        self.calls.lock().unwrap().push(request.prompt.clone());
        let text = self.answer(&request.prompt)?;
        Ok(Completion {
            usage: TokenUsage {
                input_tokens: request.prompt.split_whitespace().count() as u32,
                output_tokens: text.split_whitespace().count() as u32,
            },
            text,
            model: self.model_name.clone(),
        })
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Bag-of-words embedding provider
///
/// Each lowercase word is hashed into one of `dimensions` buckets and the
/// vector is L2-normalized, so texts sharing words have high cosine
/// similarity. Output is stable across runs.
pub struct MockEmbeddingProvider {
    model_name: String,
    dimensions: usize,
    failure: Mutex<Option<LlmError>>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingProvider {
    /// Create a 64-dimensional provider
    pub fn new() -> Self {
        Self::with_model("mock-embedding", 64)
    }

    /// Create a provider with a custom model name and dimensionality
    pub fn with_model(model_name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model_name: model_name.into(),
            dimensions: dimensions.max(1),
            failure: Mutex::new(None),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Make every subsequent call fail with `error`
    pub fn fail_with(&self, error: LlmError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Number of `embed_batch` calls so far
    pub fn batch_count(&self) -> usize {
        self.batch_sizes.lock().unwrap().len()
    }

    /// Sizes of each `embed_batch` call so far
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    /// Total texts embedded so far
    pub fn texts_embedded(&self) -> usize {
        self.batch_sizes.lock().unwrap().iter().sum()
    }

    /// Vector for one text
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() as usize) % self.dimensions] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

type Responder = dyn Fn(&BatchRequest) -> Option<SubRequestOutcome> + Send + Sync;

/// In-memory batch backend
///
/// The responder decides each sub-request's outcome (`None` drops it from the
/// results). Polls walk through the scripted statuses and report `Ended` once
/// the script is exhausted. Results come back in reverse submission order.
pub struct MockBatchBackend {
    responder: Arc<Responder>,
    statuses: Mutex<VecDeque<BackendStatus>>,
    jobs: Mutex<Vec<(String, Vec<BatchRequest>)>>,
    polls: Mutex<usize>,
    poll_errors: Mutex<VecDeque<LlmError>>,
    submit_error: Mutex<Option<LlmError>>,
}

impl MockBatchBackend {
    /// Create a backend with the given per-request responder
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&BatchRequest) -> Option<SubRequestOutcome> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            statuses: Mutex::new(VecDeque::new()),
            jobs: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
            poll_errors: Mutex::new(VecDeque::new()),
            submit_error: Mutex::new(None),
        }
    }

    /// Statuses returned by successive polls before `Ended`
    pub fn script_statuses(&self, statuses: impl IntoIterator<Item = BackendStatus>) {
        self.statuses.lock().unwrap().extend(statuses);
    }

    /// Errors returned by the next polls, before any scripted status
    pub fn fail_polls(&self, errors: impl IntoIterator<Item = LlmError>) {
        self.poll_errors.lock().unwrap().extend(errors);
    }

    /// Make the next submission fail
    pub fn fail_submit(&self, error: LlmError) {
        *self.submit_error.lock().unwrap() = Some(error);
    }

    /// Jobs submitted so far, with their requests
    pub fn submitted(&self) -> Vec<(String, Vec<BatchRequest>)> {
        self.jobs.lock().unwrap().clone()
    }

    /// Number of polls so far
    pub fn poll_count(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl BatchBackend for MockBatchBackend {
    async fn submit(&self, requests: &[BatchRequest]) -> LlmResult<String> {
        if let Some(error) = self.submit_error.lock().unwrap().take() {
            return Err(error);
        }
        let mut jobs = self.jobs.lock().unwrap();
        let job_id = format!("mock-batch-{}", jobs.len() + 1);
        jobs.push((job_id.clone(), requests.to_vec()));
        Ok(job_id)
    }

    async fn poll(&self, job_id: &str) -> LlmResult<BatchSnapshot> {
        *self.polls.lock().unwrap() += 1;
        if let Some(error) = self.poll_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        let total = self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == job_id)
            .map(|(_, requests)| requests.len() as u32)
            .ok_or_else(|| LlmError::Api {
                status: 404,
                message: format!("unknown batch {job_id}"),
            })?;

        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(BackendStatus::Ended);
        let counts = match status {
            BackendStatus::Ended => RequestCounts { processing: 0, succeeded: total, errored: 0 },
            _ => RequestCounts { processing: total, succeeded: 0, errored: 0 },
        };
        Ok(BatchSnapshot { status, counts })
    }

    async fn results(&self, job_id: &str) -> LlmResult<Vec<BatchResultItem>> {
        let jobs = self.jobs.lock().unwrap();
        let (_, requests) = jobs
            .iter()
            .find(|(id, _)| id == job_id)
            .ok_or_else(|| LlmError::Api {
                status: 404,
                message: format!("unknown batch {job_id}"),
            })?;

        Ok(requests
            .iter()
            .rev()
            .filter_map(|request| {
                (self.responder)(request).map(|outcome| BatchResultItem {
                    correlation_id: request.correlation_id.clone(),
                    outcome,
                })
            })
            .collect())
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

/// Successful outcome carrying `text`, for use in batch responders
pub fn succeeded(text: impl Into<String>) -> SubRequestOutcome {
    SubRequestOutcome::Succeeded(Completion {
        text: text.into(),
        model: "mock-model".to_string(),
        usage: TokenUsage::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completion_queue_then_rules_then_default() {
        let provider = MockCompletionProvider::new();
        provider.push_response("queued");
        provider.respond_to("weight", "rule");

        let ask = |p: &'static str| provider.complete(CompletionRequest::new(p, 10));
        assert_eq!(ask("estimate weight").await.unwrap().text, "queued");
        assert_eq!(ask("estimate weight").await.unwrap().text, "rule");
        assert_eq!(ask("other").await.unwrap().text, "mock response");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_completion_scripted_error() {
        let provider = MockCompletionProvider::new();
        provider.fail_on("boom", LlmError::Transport("reset".into()));
        let err = provider
            .complete(CompletionRequest::new("boom", 10))
            .await
            .unwrap_err();
        assert_eq!(err, LlmError::Transport("reset".into()));
    }

    #[tokio::test]
    async fn test_embeddings_are_normalized_and_similar_for_shared_words() {
        let provider = MockEmbeddingProvider::new();
        let vectors = provider
            .embed_batch(&[
                "Dog Collars".to_string(),
                "dog collars leather".to_string(),
                "".to_string(),
            ])
            .await
            .unwrap();

        let norm: f32 = vectors[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        let dot: f32 = vectors[0].iter().zip(&vectors[1]).map(|(a, b)| a * b).sum();
        assert!(dot > 0.7);
        assert!(vectors[2].iter().all(|v| *v == 0.0));
        assert_eq!(provider.batch_sizes(), vec![3]);
    }

    #[tokio::test]
    async fn test_batch_backend_drops_none_and_reverses_order() {
        let backend = MockBatchBackend::new(|request| {
            (request.correlation_id != "taxonomy-1").then(|| succeeded(request.prompt.clone()))
        });
        backend.script_statuses([BackendStatus::InProgress]);

        let requests: Vec<BatchRequest> = (0..3)
            .map(|i| BatchRequest::new(format!("taxonomy-{i}"), format!("p{i}"), 10))
            .collect();
        let job_id = backend.submit(&requests).await.unwrap();

        assert_eq!(backend.poll(&job_id).await.unwrap().status, BackendStatus::InProgress);
        assert_eq!(backend.poll(&job_id).await.unwrap().status, BackendStatus::Ended);

        let ids: Vec<String> = backend
            .results(&job_id)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.correlation_id)
            .collect();
        assert_eq!(ids, vec!["taxonomy-2", "taxonomy-0"]);
        assert_eq!(backend.poll_count(), 2);
    }
}
