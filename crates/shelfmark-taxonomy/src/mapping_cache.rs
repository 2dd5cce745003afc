//! Persisted category-path → external-category decisions
//!
//! Valid only for the pair of taxonomies it was built against. If either
//! fingerprint differs when the cache is opened, every stored decision is
//! discarded. Only `Mapped` decisions are persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfmark_core::{CategoryPath, DocumentStore, MappingDecision, StoreResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Format version of the persisted mapping cache
pub const MAPPING_CACHE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingCacheDocument {
    pub version: String,
    pub external_fingerprint: String,
    pub internal_fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub category_count: usize,
    pub mapped_count: usize,
    pub mappings: BTreeMap<String, MappingDecision>,
}

impl MappingCacheDocument {
    fn matches(&self, external: &str, internal: &str) -> bool {
        self.version == MAPPING_CACHE_VERSION
            && self.external_fingerprint == external
            && self.internal_fingerprint == internal
    }
}

pub struct MappingCache {
    store: Arc<dyn DocumentStore<MappingCacheDocument>>,
    external_fingerprint: String,
    internal_fingerprint: String,
    provider: String,
    model: String,
    created_at: DateTime<Utc>,
    mappings: BTreeMap<String, MappingDecision>,
}

impl MappingCache {
    /// Loads the cache, discarding it if it was built against other taxonomies
    pub fn open(
        store: Arc<dyn DocumentStore<MappingCacheDocument>>,
        external_fingerprint: impl Into<String>,
        internal_fingerprint: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let mut cache = Self {
            store,
            external_fingerprint: external_fingerprint.into(),
            internal_fingerprint: internal_fingerprint.into(),
            provider: provider.into(),
            model: model.into(),
            created_at: Utc::now(),
            mappings: BTreeMap::new(),
        };

        match cache.store.load() {
            Ok(Some(doc))
                if doc.matches(&cache.external_fingerprint, &cache.internal_fingerprint) =>
            {
                info!(mappings = doc.mappings.len(), "Loaded category mapping cache");
                cache.created_at = doc.created_at;
                cache.mappings = only_mapped(doc.mappings);
            }
            Ok(Some(doc)) => {
                info!(
                    discarded = doc.mappings.len(),
                    "Taxonomy changed since mappings were cached; starting fresh"
                );
            }
            Ok(None) => debug!("No category mapping cache yet"),
            Err(e) => warn!(error = %e, "Ignoring unreadable category mapping cache"),
        }
        cache
    }

    /// Decision stored for exactly this path
    pub fn get(&self, path: &CategoryPath) -> Option<&MappingDecision> {
        self.mappings.get(&path.to_string())
    }

    /// Most specific stored decision: full path, then `Department > Category`,
    /// then `Department`
    pub fn lookup_with_fallback(&self, path: &CategoryPath) -> Option<&MappingDecision> {
        path.lookup_keys()
            .iter()
            .find_map(|key| self.mappings.get(key))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Records a decision and persists it, merging with whatever is on disk.
    ///
    /// Unmapped decisions are not stored; returns whether anything was written.
    pub fn put(&mut self, path: &CategoryPath, decision: MappingDecision) -> StoreResult<bool> {
        if !decision.is_mapped() {
            return Ok(false);
        }

        self.merge_stored();
        let key = path.to_string();
        self.mappings.insert(key.clone(), decision);
        self.store.save(&self.document(Utc::now()))?;
        debug!(category = %key, total = self.mappings.len(), "Saved category mapping");
        Ok(true)
    }

    /// Drops the decision stored for exactly this path and persists the removal.
    ///
    /// Returns whether a decision was removed.
    pub fn remove(&mut self, path: &CategoryPath) -> StoreResult<bool> {
        self.merge_stored();
        let key = path.to_string();
        if self.mappings.remove(&key).is_none() {
            return Ok(false);
        }
        self.store.save(&self.document(Utc::now()))?;
        debug!(category = %key, total = self.mappings.len(), "Removed category mapping");
        Ok(true)
    }

    // Read-modify-write so another writer's additions survive
    fn merge_stored(&mut self) {
        match self.store.load() {
            Ok(Some(doc))
                if doc.matches(&self.external_fingerprint, &self.internal_fingerprint) =>
            {
                for (key, stored) in only_mapped(doc.mappings) {
                    self.mappings.entry(key).or_insert(stored);
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Overwriting unreadable category mapping cache"),
        }
    }

    fn document(&self, updated_at: DateTime<Utc>) -> MappingCacheDocument {
        MappingCacheDocument {
            version: MAPPING_CACHE_VERSION.to_string(),
            external_fingerprint: self.external_fingerprint.clone(),
            internal_fingerprint: self.internal_fingerprint.clone(),
            created_at: self.created_at,
            updated_at,
            provider: self.provider.clone(),
            model: self.model.clone(),
            category_count: self.mappings.len(),
            mapped_count: self.mappings.values().filter(|d| d.is_mapped()).count(),
            mappings: self.mappings.clone(),
        }
    }
}

fn only_mapped(mappings: BTreeMap<String, MappingDecision>) -> BTreeMap<String, MappingDecision> {
    mappings.into_iter().filter(|(_, d)| d.is_mapped()).collect()
}
