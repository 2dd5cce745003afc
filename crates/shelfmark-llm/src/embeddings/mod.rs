//! Embedding provider implementations

pub mod openai;

pub use openai::OpenAIEmbeddingProvider;

use shelfmark_config::EmbeddingConfig;
use shelfmark_core::{EmbeddingProvider, LlmError, LlmResult};
use std::sync::Arc;

/// Create the configured embedding provider
pub fn create_embedding_provider(
    config: &EmbeddingConfig,
    api_key: String,
    timeout_secs: u64,
) -> LlmResult<Arc<dyn EmbeddingProvider>> {
    if api_key.trim().is_empty() {
        return Err(LlmError::Config("embedding API key is empty".to_string()));
    }
    Ok(Arc::new(OpenAIEmbeddingProvider::new(
        api_key,
        Some(config.endpoint()),
        config.model(),
        timeout_secs,
    )))
}
