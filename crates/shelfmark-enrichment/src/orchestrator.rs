//! Interactive enhancement, one product at a time
//!
//! Each product either comes straight out of the enhancement cache or costs
//! two completion calls (taxonomy, then description) plus at most one
//! mapping call. The run stops at the first product that cannot be enhanced,
//! after flushing everything enhanced so far.

use crate::cache::EnhancementCache;
use crate::error::{EnrichmentError, EnrichmentResult};
use crate::options::{EnrichmentOptions, PromptDocuments, RunSummary};
use crate::prompts::{description_prompt, taxonomy_prompt};
use crate::resolver::CategoryResolver;
use crate::response::{description_or_fallback, parse_taxonomy_response};
use crate::steps::{finish_enhancement, identify, restore_from_cache, ProductIdentity};
use shelfmark_core::{
    Completion, CompletionProvider, CompletionRequest, Product, Sleeper, TokioSleeper,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Enriched products and what producing them took
#[derive(Debug, Clone)]
pub struct EnrichmentRun {
    pub products: Vec<Product>,
    pub summary: RunSummary,
}

/// Drives products through the cache, the model and category mapping
pub struct Orchestrator {
    provider: Arc<dyn CompletionProvider>,
    sleeper: Arc<dyn Sleeper>,
    cache: EnhancementCache,
    resolver: CategoryResolver,
    documents: PromptDocuments,
    options: EnrichmentOptions,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        cache: EnhancementCache,
        resolver: CategoryResolver,
        documents: PromptDocuments,
        options: EnrichmentOptions,
    ) -> Self {
        Self {
            provider,
            sleeper: Arc::new(TokioSleeper),
            cache,
            resolver,
            documents,
            options,
        }
    }

    /// Replace the pacing sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn cache(&self) -> &EnhancementCache {
        &self.cache
    }

    /// Enhances `products` in order.
    ///
    /// # Errors
    ///
    /// Fails fast with [`EnrichmentError::ProductFailed`] on the first product
    /// that cannot be enhanced. Enhancements completed before it are already
    /// flushed to the cache, so a rerun resumes where this one stopped.
    pub async fn run(&mut self, products: Vec<Product>) -> EnrichmentResult<EnrichmentRun> {
        let total = products.len();
        let mut summary = RunSummary::new(total);
        let mut enriched = Vec::with_capacity(total);
        let mut since_pause = 0;

        info!(
            total,
            provider = self.provider.provider_name(),
            model = self.provider.model_name(),
            mapping = self.resolver.is_enabled(),
            "Starting enhancement run"
        );

        for (position, mut product) in products.into_iter().enumerate() {
            let index = position + 1;
            debug!(index, total, product = %product.title, "Processing product");

            match self.process(&mut product, &mut summary).await {
                Ok(true) => {}
                Ok(false) => {
                    since_pause += 1;
                    if self.options.pace_every > 0
                        && since_pause >= self.options.pace_every
                        && index < total
                    {
                        self.pause().await;
                        since_pause = 0;
                    }
                }
                Err(source) => {
                    if let Err(e) = self.cache.flush() {
                        error!(error = %e, "Could not save enhancement cache before stopping");
                    }
                    error!(
                        index,
                        total,
                        product = %product.title,
                        error = %source,
                        "Enhancement failed; stopping run"
                    );
                    return Err(EnrichmentError::ProductFailed {
                        index,
                        total,
                        title: product.title,
                        source: Box::new(source),
                    });
                }
            }
            enriched.push(product);
        }

        self.cache.flush()?;
        info!(
            enhanced = summary.enhanced,
            cached = summary.cached,
            backfilled = summary.backfilled,
            unmapped = summary.unmapped,
            model_calls = summary.model_calls,
            input_tokens = summary.usage.input_tokens,
            output_tokens = summary.usage.output_tokens,
            "Enhancement run complete"
        );
        Ok(EnrichmentRun {
            products: enriched,
            summary,
        })
    }

    /// Returns whether the product came from the cache
    async fn process(
        &mut self,
        product: &mut Product,
        summary: &mut RunSummary,
    ) -> EnrichmentResult<bool> {
        let identity = identify(product)?;

        if !self.options.force_refresh_cache
            && restore_from_cache(&mut self.cache, &self.resolver, product, &identity, summary)
        {
            return Ok(true);
        }

        self.enhance(product, &identity, summary).await?;
        Ok(false)
    }

    async fn enhance(
        &mut self,
        product: &mut Product,
        identity: &ProductIdentity,
        summary: &mut RunSummary,
    ) -> EnrichmentResult<()> {
        let prompt = taxonomy_prompt(product, &self.documents.taxonomy);
        let completion = self
            .complete(prompt, self.options.taxonomy_max_tokens, summary)
            .await?;
        let assignment = parse_taxonomy_response(&completion.text)?;
        info!(product = %product.title, path = %assignment.path, "Assigned category");

        let prompt = description_prompt(
            &product.title,
            &product.description,
            assignment.path.department(),
            &self.documents.voice_tone,
        );
        let completion = self
            .complete(prompt, self.options.description_max_tokens, summary)
            .await?;
        let description =
            description_or_fallback(&completion.text, &product.description, &product.title);

        finish_enhancement(
            &mut self.cache,
            &mut self.resolver,
            product,
            identity,
            &assignment,
            description,
            self.provider.provider_name(),
            &completion.model,
            summary,
        )
        .await;
        Ok(())
    }

    async fn complete(
        &self,
        prompt: String,
        max_tokens: u32,
        summary: &mut RunSummary,
    ) -> EnrichmentResult<Completion> {
        let completion = self
            .provider
            .complete(CompletionRequest::new(prompt, max_tokens))
            .await?;
        debug!(
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "Model call completed"
        );
        summary.record_call(completion.usage);
        Ok(completion)
    }

    async fn pause(&mut self) {
        if let Err(e) = self.cache.flush() {
            warn!(error = %e, "Could not save enhancement cache before pacing pause");
        }
        info!(
            every = self.options.pace_every,
            pause_secs = self.options.pace_pause.as_secs(),
            "Pacing pause"
        );
        self.sleeper.sleep(self.options.pace_pause).await;
    }
}
