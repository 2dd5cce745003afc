use super::default_true;
use serde::{Deserialize, Serialize};

/// Shopify's published category list
pub const DEFAULT_TAXONOMY_URL: &str =
    "https://raw.githubusercontent.com/Shopify/product-taxonomy/main/dist/en/categories.txt";

/// External category mapping settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Map categories onto the external taxonomy at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Candidates shown to the model after narrowing
    pub top_k: usize,
    /// Characters of product description included in the narrowing query
    pub description_excerpt_chars: usize,
    /// Source of the external taxonomy document
    pub taxonomy_url: String,
    /// Days a fetched taxonomy is considered fresh
    pub freshness_days: u32,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: 50,
            description_excerpt_chars: 500,
            taxonomy_url: DEFAULT_TAXONOMY_URL.to_string(),
            freshness_days: 30,
        }
    }
}
