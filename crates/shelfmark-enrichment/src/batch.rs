//! Asynchronous batch enhancement
//!
//! Products that miss the cache are enhanced in two dependent batch jobs:
//! taxonomy first, then descriptions for the products whose taxonomy came
//! back usable. Results are joined to products by correlation id only.
//!
//! A sub-request that errors or goes missing marks just its product as
//! failed. A job that ends in any terminal state other than success fails
//! the whole run.

use crate::cache::EnhancementCache;
use crate::error::{EnrichmentError, EnrichmentResult};
use crate::options::{EnrichmentOptions, PromptDocuments, RunSummary};
use crate::prompts::{description_prompt, taxonomy_prompt};
use crate::resolver::CategoryResolver;
use crate::response::{description_or_fallback, parse_taxonomy_response, TaxonomyAssignment};
use crate::steps::{finish_enhancement, identify, restore_from_cache, ProductIdentity};
use serde::Serialize;
use shelfmark_core::{
    BackendStatus, BatchBackend, BatchJob, BatchRequest, Completion, LlmError, Product, Sleeper,
    SubRequestOutcome, TokioSleeper,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const TAXONOMY_STAGE: &str = "taxonomy";
const DESCRIPTION_STAGE: &str = "description";

fn correlation_id(stage: &str, position: usize) -> String {
    format!("{stage}-{position}")
}

/// A product the batch could not enhance; it is returned unchanged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductFailure {
    /// 1-based position in the input
    pub index: usize,
    pub title: String,
    pub reason: String,
}

/// Output of a batch run
#[derive(Debug, Clone)]
pub struct BatchRun {
    /// Every input product, in input order
    pub products: Vec<Product>,
    pub failures: Vec<ProductFailure>,
    pub summary: RunSummary,
}

struct Pending {
    position: usize,
    identity: ProductIdentity,
}

/// Runs enhancement through a [`BatchBackend`]
pub struct BatchCoordinator {
    backend: Arc<dyn BatchBackend>,
    sleeper: Arc<dyn Sleeper>,
    poll_interval: Duration,
    provider_name: String,
    cache: EnhancementCache,
    resolver: CategoryResolver,
    documents: PromptDocuments,
    options: EnrichmentOptions,
}

impl BatchCoordinator {
    pub fn new(
        backend: Arc<dyn BatchBackend>,
        poll_interval: Duration,
        cache: EnhancementCache,
        resolver: CategoryResolver,
        documents: PromptDocuments,
        options: EnrichmentOptions,
    ) -> Self {
        Self {
            provider_name: backend.backend_name().to_string(),
            backend,
            sleeper: Arc::new(TokioSleeper),
            poll_interval,
            cache,
            resolver,
            documents,
            options,
        }
    }

    /// Replace the polling sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn cache(&self) -> &EnhancementCache {
        &self.cache
    }

    /// Enhances `products` through batch jobs, blocking until they finish.
    ///
    /// # Errors
    ///
    /// [`EnrichmentError::BatchFailed`] when a job reaches a failed terminal
    /// state; per-product problems are reported in [`BatchRun::failures`].
    pub async fn run(&mut self, mut products: Vec<Product>) -> EnrichmentResult<BatchRun> {
        let total = products.len();
        let mut summary = RunSummary::new(total);
        let mut failures = Vec::new();
        let mut pending = Vec::new();

        for (position, product) in products.iter_mut().enumerate() {
            let identity = match identify(product) {
                Ok(identity) => identity,
                Err(e) => {
                    failures.push(failure(position, product, e.to_string()));
                    continue;
                }
            };
            if !self.options.force_refresh_cache
                && restore_from_cache(&mut self.cache, &self.resolver, product, &identity, &mut summary)
            {
                continue;
            }
            pending.push(Pending { position, identity });
        }

        info!(
            total,
            cached = summary.cached,
            to_submit = pending.len(),
            backend = self.backend.backend_name(),
            "Starting batch enhancement"
        );
        if pending.is_empty() {
            self.cache.flush()?;
            summary.failed = failures.len();
            return Ok(BatchRun { products, failures, summary });
        }

        let outcome = self
            .enhance_pending(&mut products, pending, &mut failures, &mut summary)
            .await;
        // Whatever finished is kept, even when a later job failed
        let flushed = self.cache.flush();
        outcome?;
        flushed?;

        summary.failed = failures.len();
        info!(
            enhanced = summary.enhanced,
            cached = summary.cached,
            failed = summary.failed,
            unmapped = summary.unmapped,
            "Batch enhancement complete"
        );
        Ok(BatchRun { products, failures, summary })
    }

    async fn enhance_pending(
        &mut self,
        products: &mut [Product],
        pending: Vec<Pending>,
        failures: &mut Vec<ProductFailure>,
        summary: &mut RunSummary,
    ) -> EnrichmentResult<()> {
        let requests = pending
            .iter()
            .map(|p| {
                BatchRequest::new(
                    correlation_id(TAXONOMY_STAGE, p.position),
                    taxonomy_prompt(&products[p.position], &self.documents.taxonomy),
                    self.options.taxonomy_max_tokens,
                )
            })
            .collect();
        let mut job = self.run_job(TAXONOMY_STAGE, requests).await?;

        let mut assigned: Vec<(Pending, TaxonomyAssignment)> = Vec::new();
        for p in pending {
            let product = &products[p.position];
            let id = correlation_id(TAXONOMY_STAGE, p.position);
            let parsed = succeeded(job.take_outcome(&id), summary)
                .and_then(|completion| parse_taxonomy_response(&completion.text));
            match parsed {
                Ok(assignment) => assigned.push((p, assignment)),
                Err(e) => {
                    warn!(index = p.position + 1, product = %product.title, error = %e, "Taxonomy sub-request failed");
                    failures.push(failure(p.position, product, e.to_string()));
                }
            }
        }

        if assigned.is_empty() {
            return Ok(());
        }

        // Only products with a usable taxonomy go on to the second stage
        let requests = assigned
            .iter()
            .map(|(p, assignment)| {
                let product = &products[p.position];
                BatchRequest::new(
                    correlation_id(DESCRIPTION_STAGE, p.position),
                    description_prompt(
                        &product.title,
                        &product.description,
                        assignment.path.department(),
                        &self.documents.voice_tone,
                    ),
                    self.options.description_max_tokens,
                )
            })
            .collect();
        let mut job = self.run_job(DESCRIPTION_STAGE, requests).await?;

        for (p, assignment) in assigned {
            let product = &mut products[p.position];
            let id = correlation_id(DESCRIPTION_STAGE, p.position);
            let completion = match succeeded(job.take_outcome(&id), summary) {
                Ok(completion) => completion,
                Err(e) => {
                    warn!(index = p.position + 1, product = %product.title, error = %e, "Description sub-request failed");
                    failures.push(failure(p.position, product, e.to_string()));
                    continue;
                }
            };
            let description =
                description_or_fallback(&completion.text, &product.description, &product.title);
            finish_enhancement(
                &mut self.cache,
                &mut self.resolver,
                product,
                &p.identity,
                &assignment,
                description,
                &self.provider_name,
                &completion.model,
                summary,
            )
            .await;
        }
        Ok(())
    }

    /// Submits one job and polls it to a terminal state
    async fn run_job(&self, stage: &str, requests: Vec<BatchRequest>) -> EnrichmentResult<BatchJob> {
        let job_id = self.backend.submit(&requests).await?;
        let mut job = BatchJob::submitted(job_id, requests);
        job.start()?;
        info!(
            job_id = job.job_id(),
            stage,
            requests = job.requests().len(),
            "Submitted batch job"
        );

        loop {
            let snapshot = match self.backend.poll(job.job_id()).await {
                Ok(snapshot) => snapshot,
                Err(e) if is_transient(&e) => {
                    let wait = match &e {
                        LlmError::RateLimited { retry_after: Some(after) } => {
                            (*after).max(self.poll_interval)
                        }
                        _ => self.poll_interval,
                    };
                    warn!(job_id = job.job_id(), error = %e, "Batch poll failed; retrying");
                    self.sleeper.sleep(wait).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match snapshot.status {
                BackendStatus::InProgress => {
                    job.record_progress(snapshot.counts)?;
                    info!(
                        job_id = job.job_id(),
                        stage,
                        succeeded = snapshot.counts.succeeded,
                        errored = snapshot.counts.errored,
                        processing = snapshot.counts.processing,
                        "Batch in progress"
                    );
                    self.sleeper.sleep(self.poll_interval).await;
                }
                BackendStatus::Ended => {
                    job.record_progress(snapshot.counts)?;
                    let results = self.backend.results(job.job_id()).await?;
                    info!(job_id = job.job_id(), stage, results = results.len(), "Batch ended");
                    job.complete(results.into_iter().map(|r| (r.correlation_id, r.outcome)))?;
                    return Ok(job);
                }
                BackendStatus::Failed(status) => {
                    job.fail(status.clone())?;
                    error!(job_id = job.job_id(), stage, %status, "Batch job failed");
                    return Err(EnrichmentError::BatchFailed {
                        job_id: job.job_id().to_string(),
                        status,
                    });
                }
            }
        }
    }
}

fn is_transient(error: &LlmError) -> bool {
    error.is_rate_limited() || matches!(error, LlmError::Transport(_))
}

/// The completion of a successful sub-request, counting its usage
fn succeeded(outcome: SubRequestOutcome, summary: &mut RunSummary) -> EnrichmentResult<Completion> {
    match outcome {
        SubRequestOutcome::Succeeded(completion) => {
            summary.record_call(completion.usage);
            Ok(completion)
        }
        SubRequestOutcome::Errored(message) => Err(EnrichmentError::SubRequest(message)),
        SubRequestOutcome::Missing => Err(EnrichmentError::SubRequest(
            "no result returned".to_string(),
        )),
    }
}

fn failure(position: usize, product: &Product, reason: String) -> ProductFailure {
    ProductFailure {
        index: position + 1,
        title: product.title.clone(),
        reason,
    }
}
