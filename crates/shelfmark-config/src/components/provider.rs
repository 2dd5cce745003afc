//! Completion provider configuration

use serde::{Deserialize, Serialize};

/// Default Anthropic model
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-5-20250929";
/// Default OpenAI model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default output budget for the taxonomy/weight call
pub const DEFAULT_TAXONOMY_MAX_TOKENS: u32 = 16000;
/// Default output budget for description rewriting and mapping
pub const DEFAULT_DESCRIPTION_MAX_TOKENS: u32 = 2048;

/// Supported completion vendors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Messages API
    #[default]
    Anthropic,
    /// OpenAI Chat Completions API
    #[serde(rename = "openai")]
    OpenAI,
}

impl ProviderKind {
    /// Identifier recorded in caches and logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
        }
    }

    /// Environment variable holding this vendor's API key
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
        }
    }
}

/// Completion provider settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Vendor to use
    pub kind: ProviderKind,
    /// Model identifier; vendor default when unset
    pub model: Option<String>,
    /// API base URL override
    pub endpoint: Option<String>,
    /// API key; the vendor's environment variable takes priority
    pub api_key: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Output token budget for the taxonomy/weight call
    pub taxonomy_max_tokens: Option<u32>,
    /// Output token budget for description and mapping calls
    pub description_max_tokens: Option<u32>,
}

impl ProviderConfig {
    /// API base URL, using the vendor default if not specified
    pub fn endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| match self.kind {
            ProviderKind::Anthropic => "https://api.anthropic.com/v1".to_string(),
            ProviderKind::OpenAI => "https://api.openai.com/v1".to_string(),
        })
    }

    /// Model identifier, using the vendor default if not specified
    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.kind {
                ProviderKind::Anthropic => DEFAULT_ANTHROPIC_MODEL,
                ProviderKind::OpenAI => DEFAULT_OPENAI_MODEL,
            }
            .to_string()
        })
    }

    /// Request timeout in seconds
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// Output budget for the taxonomy/weight call
    pub fn taxonomy_max_tokens(&self) -> u32 {
        self.taxonomy_max_tokens.unwrap_or(DEFAULT_TAXONOMY_MAX_TOKENS)
    }

    /// Output budget for description and mapping calls
    pub fn description_max_tokens(&self) -> u32 {
        self.description_max_tokens
            .unwrap_or(DEFAULT_DESCRIPTION_MAX_TOKENS)
    }
}
