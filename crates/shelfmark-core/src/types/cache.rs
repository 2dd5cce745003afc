use super::taxonomy::CategoryPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One memoized enhancement, trusted only while `input_hash` matches the
/// product's current content fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementCacheEntry {
    pub enhanced_at: DateTime<Utc>,
    /// Content fingerprint of the product at enhancement time
    pub input_hash: String,
    pub provider: String,
    pub model: String,
    pub department: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub enhanced_description: String,
    #[serde(default)]
    pub external_category_id: Option<String>,
    #[serde(default)]
    pub external_category_name: Option<String>,
}

impl EnhancementCacheEntry {
    /// Category path recorded in this entry, if it is well formed
    pub fn category_path(&self) -> Option<CategoryPath> {
        CategoryPath::new(&self.department, &self.category, self.subcategory.as_deref()).ok()
    }
}
