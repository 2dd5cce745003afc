//! Completion provider implementations

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIChatProvider;

use shelfmark_config::{ProviderConfig, ProviderKind};
use shelfmark_core::{CompletionProvider, LlmError, LlmResult};
use std::sync::Arc;

/// Create the configured completion provider
pub fn create_completion_provider(
    config: &ProviderConfig,
    api_key: String,
) -> LlmResult<Arc<dyn CompletionProvider>> {
    if api_key.trim().is_empty() {
        return Err(LlmError::Config(format!(
            "{} API key is empty",
            config.kind.as_str()
        )));
    }

    match config.kind {
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicProvider::new(
            api_key,
            Some(config.endpoint()),
            config.model(),
            config.timeout_secs(),
        ))),
        ProviderKind::OpenAI => Ok(Arc::new(OpenAIChatProvider::new(
            api_key,
            Some(config.endpoint()),
            config.model(),
            config.timeout_secs(),
        ))),
    }
}
