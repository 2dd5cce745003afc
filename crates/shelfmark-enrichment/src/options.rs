use serde::Serialize;
use shelfmark_config::ShelfmarkConfig;
use shelfmark_core::TokenUsage;
use std::time::Duration;

/// Per-run knobs for the orchestrator and batch coordinator
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentOptions {
    /// Ignore cached enhancements and re-enhance every product
    pub force_refresh_cache: bool,
    /// Pause after this many model-backed enhancements; 0 disables pacing
    pub pace_every: usize,
    pub pace_pause: Duration,
    pub taxonomy_max_tokens: u32,
    pub description_max_tokens: u32,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self::from_config(&ShelfmarkConfig::default())
    }
}

impl EnrichmentOptions {
    pub fn from_config(config: &ShelfmarkConfig) -> Self {
        Self {
            force_refresh_cache: false,
            pace_every: config.pacing.every,
            pace_pause: config.pacing.pause(),
            taxonomy_max_tokens: config.provider.taxonomy_max_tokens(),
            description_max_tokens: config.provider.description_max_tokens(),
        }
    }
}

/// Reference documents embedded in every enhancement prompt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptDocuments {
    /// Our taxonomy, in the Markdown form the model chooses from
    pub taxonomy: String,
    pub voice_tone: String,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    /// Products sent to the model this run
    pub enhanced: usize,
    /// Products restored from the enhancement cache
    pub cached: usize,
    /// Cache hits whose external category was filled in from the mapping cache
    pub backfilled: usize,
    pub mapped: usize,
    pub unmapped: usize,
    /// Products that could not be enhanced (batch mode only)
    pub failed: usize,
    pub model_calls: usize,
    pub usage: TokenUsage,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub(crate) fn record_call(&mut self, usage: TokenUsage) {
        self.model_calls += 1;
        self.usage += usage;
    }
}
