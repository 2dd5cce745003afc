//! Fixtures shared by the unit tests

use crate::resolver::{CategoryResolver, ResolverSettings};
use async_trait::async_trait;
use serde_json::json;
use shelfmark_core::{ExternalCategory, MemoryStore, Sleeper};
use shelfmark_llm::{MockCompletionProvider, MockEmbeddingProvider};
use shelfmark_taxonomy::{
    CategoryMapper, EmbeddingIndexStore, ExternalTaxonomy, IndexDocument, MappingCache,
    MappingCacheDocument, TaxonomyOrigin,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) const HAMMERS_ID: &str = "gid://shopify/TaxonomyCategory/hw-1-2";
pub(crate) const DOG_FOOD_ID: &str = "gid://shopify/TaxonomyCategory/ap-2-3";

/// Prefixes that tell the three kinds of prompt apart
pub(crate) const TAXONOMY_CALL: &str = "You categorize products";
pub(crate) const DESCRIPTION_CALL: &str = "You are a product copywriter";
pub(crate) const MAPPING_CALL: &str = "You map our internal product categories";

pub(crate) fn external_taxonomy() -> ExternalTaxonomy {
    ExternalTaxonomy::new(
        vec![
            ExternalCategory::new(HAMMERS_ID, "Hardware > Tools > Hammers"),
            ExternalCategory::new(DOG_FOOD_ID, "Animals & Pet Supplies > Dog Supplies > Dog Food"),
            ExternalCategory::new("gid://shopify/TaxonomyCategory/hw-1", "Hardware > Tools"),
            ExternalCategory::new("gid://shopify/TaxonomyCategory/hg-1", "Home & Garden > Lawn & Garden"),
        ],
        TaxonomyOrigin::FreshCache,
    )
}

pub(crate) fn taxonomy_response(department: &str, category: &str, subcategory: &str) -> String {
    json!({
        "department": department,
        "category": category,
        "subcategory": subcategory,
        "reasoning": "fits the taxonomy",
        "weight_estimation": {
            "original_weight": 0,
            "product_weight": 2.0,
            "product_packaging_weight": 0.2,
            "shipping_packaging_weight": 1.0,
            "calculated_shipping_weight": 3.2,
            "final_shipping_weight": 3.5,
            "confidence": "medium",
            "source": "estimated",
            "reasoning": "typical for the category"
        },
        "purchase_options": [1, 2],
        "needs_review": false
    })
    .to_string()
}

pub(crate) fn mapping_response(id: &str) -> String {
    json!({
        "category_id": id,
        "category_name": "ignored",
        "confidence": "high",
        "rationale": "closest leaf"
    })
    .to_string()
}

/// Resolver over [`external_taxonomy`] with mock providers
pub(crate) async fn active_resolver(
    completions: Arc<MockCompletionProvider>,
    embedder: Arc<MockEmbeddingProvider>,
    mapping_store: MemoryStore<MappingCacheDocument>,
    settings: ResolverSettings,
) -> CategoryResolver {
    let taxonomy = external_taxonomy();
    let index = EmbeddingIndexStore::new(Arc::new(MemoryStore::<IndexDocument>::new()), 16)
        .get_or_build(&taxonomy, embedder.as_ref(), false)
        .await
        .unwrap();
    let cache = MappingCache::open(
        Arc::new(mapping_store),
        taxonomy.fingerprint(),
        "internal-fp",
        "mock",
        "mock-model",
    );
    CategoryResolver::new(
        taxonomy,
        index,
        embedder,
        CategoryMapper::new(completions, 1024),
        cache,
        settings,
    )
}

/// Sleeper that returns immediately and records what it was asked to do
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    naps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn naps(&self) -> Vec<Duration> {
        self.naps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.naps.lock().unwrap().push(duration);
    }
}
