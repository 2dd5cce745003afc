//! Batch backend implementations
//!
//! Both vendors accept a job of correlated sub-requests, expose a pollable
//! status and return results keyed by `custom_id`. The correlation id of a
//! [`shelfmark_core::BatchRequest`] is sent as that `custom_id`.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicBatchBackend;
pub use openai::OpenAIBatchBackend;

use shelfmark_config::{BatchConfig, ProviderConfig, ProviderKind};
use shelfmark_core::{BatchBackend, LlmError, LlmResult};
use std::sync::Arc;

/// Create the batch backend for the configured completion vendor
pub fn create_batch_backend(
    provider: &ProviderConfig,
    batch: &BatchConfig,
    api_key: String,
) -> LlmResult<Arc<dyn BatchBackend>> {
    if api_key.trim().is_empty() {
        return Err(LlmError::Config(format!(
            "{} API key is empty",
            provider.kind.as_str()
        )));
    }

    match provider.kind {
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicBatchBackend::new(
            api_key,
            Some(provider.endpoint()),
            provider.model(),
            provider.timeout_secs(),
        ))),
        ProviderKind::OpenAI => Ok(Arc::new(OpenAIBatchBackend::new(
            api_key,
            Some(provider.endpoint()),
            provider.model(),
            batch.completion_window.clone(),
            provider.timeout_secs(),
        ))),
    }
}
