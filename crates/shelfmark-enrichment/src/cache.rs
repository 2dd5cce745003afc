//! Enhancement cache
//!
//! One persisted document mapping product keys to their last enhancement.
//! An entry is only trusted while its `input_hash` equals the product's
//! current content fingerprint, so each (key, fingerprint) pair is paid for
//! at most once.

use serde::{Deserialize, Serialize};
use shelfmark_core::{DocumentStore, EnhancementCacheEntry, StoreResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Format version of the persisted enhancement cache
pub const CACHE_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementCacheDocument {
    pub cache_version: String,
    #[serde(default)]
    pub products: BTreeMap<String, EnhancementCacheEntry>,
}

impl Default for EnhancementCacheDocument {
    fn default() -> Self {
        Self {
            cache_version: CACHE_VERSION.to_string(),
            products: BTreeMap::new(),
        }
    }
}

/// Result of looking a product up
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheLookup<'a> {
    Hit(&'a EnhancementCacheEntry),
    /// An entry exists but was made from different content
    Stale,
    Miss,
}

pub struct EnhancementCache {
    store: Arc<dyn DocumentStore<EnhancementCacheDocument>>,
    products: BTreeMap<String, EnhancementCacheEntry>,
    dirty: bool,
}

impl EnhancementCache {
    /// Loads the persisted cache. An unreadable document starts an empty
    /// cache; it is replaced on the next flush.
    pub fn load(store: Arc<dyn DocumentStore<EnhancementCacheDocument>>) -> Self {
        let products = match store.load() {
            Ok(Some(doc)) => {
                info!(entries = doc.products.len(), "Loaded enhancement cache");
                doc.products
            }
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(error = %e, location = %store.location(), "Ignoring unreadable enhancement cache");
                BTreeMap::new()
            }
        };
        Self {
            store,
            products,
            dirty: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&EnhancementCacheEntry> {
        self.products.get(key)
    }

    /// Hit only if the stored fingerprint equals `fingerprint`
    pub fn lookup(&self, key: &str, fingerprint: &str) -> CacheLookup<'_> {
        match self.products.get(key) {
            Some(entry) if entry.input_hash == fingerprint => CacheLookup::Hit(entry),
            Some(_) => CacheLookup::Stale,
            None => CacheLookup::Miss,
        }
    }

    pub fn put(&mut self, key: impl Into<String>, entry: EnhancementCacheEntry) {
        self.products.insert(key.into(), entry);
        self.dirty = true;
    }

    /// Records a late-resolved external category on an existing entry
    pub fn set_external_category(&mut self, key: &str, id: &str, name: &str) -> bool {
        match self.products.get_mut(key) {
            Some(entry) => {
                entry.external_category_id = Some(id.to_string());
                entry.external_category_name = Some(name.to_string());
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Persists pending changes; a no-op when nothing changed
    pub fn flush(&mut self) -> StoreResult<()> {
        if !self.dirty {
            return Ok(());
        }
        let doc = EnhancementCacheDocument {
            cache_version: CACHE_VERSION.to_string(),
            products: self.products.clone(),
        };
        self.store.save(&doc)?;
        self.dirty = false;
        debug!(entries = self.products.len(), location = %self.store.location(), "Flushed enhancement cache");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shelfmark_core::{JsonFileStore, MemoryStore};

    fn entry(hash: &str) -> EnhancementCacheEntry {
        EnhancementCacheEntry {
            enhanced_at: Utc::now(),
            input_hash: hash.to_string(),
            provider: "mock".to_string(),
            model: "mock-model".to_string(),
            department: "Tools".to_string(),
            category: "Hand Tools".to_string(),
            subcategory: Some("Hammers".to_string()),
            enhanced_description: "<p>Drive nails.</p>".to_string(),
            external_category_id: None,
            external_category_name: None,
        }
    }

    #[test]
    fn test_lookup_requires_matching_fingerprint() {
        let mut cache = EnhancementCache::load(Arc::new(MemoryStore::<EnhancementCacheDocument>::new()));
        cache.put("42", entry("abc"));

        assert!(matches!(cache.lookup("42", "abc"), CacheLookup::Hit(_)));
        assert_eq!(cache.lookup("42", "def"), CacheLookup::Stale);
        assert_eq!(cache.lookup("7", "abc"), CacheLookup::Miss);
    }

    #[test]
    fn test_flush_only_when_dirty() {
        let store = Arc::new(MemoryStore::<EnhancementCacheDocument>::new());
        let mut cache = EnhancementCache::load(store.clone());

        cache.flush().unwrap();
        assert_eq!(store.save_count(), 0);

        cache.put("42", entry("abc"));
        cache.flush().unwrap();
        cache.flush().unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.snapshot().unwrap().cache_version, CACHE_VERSION);
    }

    #[test]
    fn test_set_external_category_marks_dirty() {
        let store = Arc::new(MemoryStore::<EnhancementCacheDocument>::new());
        let mut cache = EnhancementCache::load(store.clone());
        assert!(!cache.set_external_category("missing", "gid://1", "A > B"));

        cache.put("42", entry("abc"));
        cache.flush().unwrap();
        assert!(cache.set_external_category("42", "gid://1", "A > B"));
        cache.flush().unwrap();

        let saved = store.snapshot().unwrap();
        assert_eq!(saved.products["42"].external_category_id.as_deref(), Some("gid://1"));
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn test_survives_restart_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("enhanced_cache.json");

        let mut cache = EnhancementCache::load(Arc::new(JsonFileStore::<EnhancementCacheDocument>::new(&path)));
        cache.put("widget", entry("abc"));
        cache.flush().unwrap();

        let reloaded = EnhancementCache::load(Arc::new(JsonFileStore::<EnhancementCacheDocument>::new(&path)));
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("widget").unwrap().subcategory.as_deref(), Some("Hammers"));

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["cache_version"], "1.0");
        assert_eq!(raw["products"]["widget"]["input_hash"], "abc");
    }

    #[test]
    fn test_corrupt_document_starts_empty() {
        let cache = EnhancementCache::load(Arc::new(MemoryStore::<EnhancementCacheDocument>::corrupted()));
        assert!(cache.is_empty());
    }
}
