use serde::{Deserialize, Serialize};

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
/// Maximum inputs per embedding request
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 2048;

/// Embedding provider settings (OpenAI-compatible endpoint)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding model identifier
    pub model: Option<String>,
    /// API base URL override
    pub endpoint: Option<String>,
    /// API key; `OPENAI_API_KEY` takes priority
    pub api_key: Option<String>,
    /// Inputs per request when rebuilding the index
    pub batch_size: Option<usize>,
}

impl EmbeddingConfig {
    /// Embedding model, using the default if not specified
    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string())
    }

    /// API base URL
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
    }

    /// Inputs per request, never zero
    pub fn batch_size(&self) -> usize {
        self.batch_size
            .unwrap_or(DEFAULT_EMBEDDING_BATCH_SIZE)
            .max(1)
    }
}
