//! Hybrid lazy category mapping
//!
//! Categories are mapped on demand, the first time a product lands in them,
//! with that product as context. Accepted decisions go to the mapping cache
//! so every later product in the same category reuses them.

use shelfmark_core::{
    CategoryPath, DocumentStore, EmbeddingProvider, ExternalCategory, MappingDecision, Product,
    TokenUsage, UnmappedReason,
};
use shelfmark_taxonomy::{
    build_query, narrow, CategoryMapper, EmbeddingIndex, EmbeddingIndexStore, ExternalTaxonomy,
    ExternalTaxonomySource, MappingCache, MappingCacheDocument, MappingContext,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tuning for candidate narrowing and cache refresh
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub top_k: usize,
    pub excerpt_chars: usize,
    /// Re-map each category once per run even if a decision is cached
    pub force_refresh_mapping: bool,
    /// Rebuild the embedding index even if the persisted one is valid
    pub force_refresh_embeddings: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            top_k: 50,
            excerpt_chars: 500,
            force_refresh_mapping: false,
            force_refresh_embeddings: false,
        }
    }
}

/// Result of resolving one category path
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCategory {
    pub decision: MappingDecision,
    /// Token usage of the mapping call, `None` when no call was made
    pub usage: Option<TokenUsage>,
    pub from_cache: bool,
}

impl ResolvedCategory {
    fn unmapped(reason: UnmappedReason) -> Self {
        Self {
            decision: MappingDecision::unmapped(reason),
            usage: None,
            from_cache: false,
        }
    }
}

/// Collaborators needed to map categories during a run
pub struct MappingSetup<'a> {
    pub source: &'a ExternalTaxonomySource,
    pub index_store: &'a EmbeddingIndexStore,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub mapper: CategoryMapper,
    pub mapping_store: Arc<dyn DocumentStore<MappingCacheDocument>>,
    /// Fingerprint of our own taxonomy document
    pub internal_fingerprint: String,
}

struct ActiveMapping {
    taxonomy: ExternalTaxonomy,
    index: EmbeddingIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    mapper: CategoryMapper,
    cache: MappingCache,
}

/// Resolves our category paths to external categories for one run
pub struct CategoryResolver {
    active: Option<ActiveMapping>,
    settings: ResolverSettings,
    /// Decisions reached by a mapping call during this run, keyed by path
    decided: HashMap<String, MappingDecision>,
}

impl CategoryResolver {
    /// Resolver that leaves every category unmapped
    pub fn disabled() -> Self {
        Self {
            active: None,
            settings: ResolverSettings::default(),
            decided: HashMap::new(),
        }
    }

    /// Resolver over an already loaded taxonomy and index
    pub fn new(
        taxonomy: ExternalTaxonomy,
        index: EmbeddingIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        mapper: CategoryMapper,
        cache: MappingCache,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            active: Some(ActiveMapping {
                taxonomy,
                index,
                embedder,
                mapper,
                cache,
            }),
            settings,
            decided: HashMap::new(),
        }
    }

    /// Loads the external taxonomy and its embedding index.
    ///
    /// Mapping degrades to disabled when no taxonomy is available or the
    /// index cannot be built; the run itself goes on.
    pub async fn prepare(setup: MappingSetup<'_>, settings: ResolverSettings) -> Self {
        let taxonomy = setup.source.load().await;
        if taxonomy.is_empty() {
            warn!("No external taxonomy available; category mapping disabled for this run");
            return Self {
                settings,
                ..Self::disabled()
            };
        }

        let index = match setup
            .index_store
            .get_or_build(
                &taxonomy,
                setup.embedder.as_ref(),
                settings.force_refresh_embeddings,
            )
            .await
        {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "Embedding index unavailable; category mapping disabled for this run");
                return Self {
                    settings,
                    ..Self::disabled()
                };
            }
        };

        let cache = MappingCache::open(
            setup.mapping_store,
            taxonomy.fingerprint(),
            setup.internal_fingerprint,
            setup.mapper.provider_name(),
            setup.mapper.model_name(),
        );
        info!(
            categories = taxonomy.len(),
            cached_mappings = cache.len(),
            "Category mapping ready"
        );

        Self::new(taxonomy, index, setup.embedder, setup.mapper, cache, settings)
    }

    pub fn is_enabled(&self) -> bool {
        self.active.is_some()
    }

    /// Cached or freshly mapped decision for `path`, with `product` as context.
    ///
    /// Each path gets at most one mapping call per run; later products reuse
    /// that decision, mapped or not. Never fails; every problem ends as an
    /// `Unmapped` decision.
    pub async fn resolve(&mut self, path: &CategoryPath, product: &Product) -> ResolvedCategory {
        let Some(active) = self.active.as_mut() else {
            return ResolvedCategory::unmapped(UnmappedReason::MappingDisabled);
        };
        let key = path.to_string();

        if let Some(decision) = self.decided.get(&key) {
            debug!(%path, "Category already decided this run");
            return ResolvedCategory {
                decision: decision.clone(),
                usage: None,
                from_cache: true,
            };
        }
        if !self.settings.force_refresh_mapping {
            if let Some(decision) = active.cache.get(path) {
                debug!(%path, "Mapping cache hit");
                return ResolvedCategory {
                    decision: decision.clone(),
                    usage: None,
                    from_cache: true,
                };
            }
        }

        let query = build_query(path, product, self.settings.excerpt_chars);
        let candidates: Vec<ExternalCategory> = match narrow(
            &query,
            &active.index,
            active.embedder.as_ref(),
            self.settings.top_k,
        )
        .await
        {
            Ok(scored) => scored.into_iter().map(|s| s.category).collect(),
            Err(e) => {
                warn!(%path, error = %e, "Could not embed mapping query; category left unmapped");
                return ResolvedCategory::unmapped(UnmappedReason::MappingFailed);
            }
        };

        let context = MappingContext {
            title: product.title.clone(),
            description_excerpt: product.description_excerpt(self.settings.excerpt_chars),
        };
        let outcome = active
            .mapper
            .map(path, &candidates, &active.taxonomy, &context)
            .await;
        self.decided.insert(key, outcome.decision.clone());

        match &outcome.decision {
            MappingDecision::Mapped { external_name, .. } => {
                info!(%path, external = %external_name, "Mapped category");
                if let Err(e) = active.cache.put(path, outcome.decision.clone()) {
                    warn!(%path, error = %e, "Could not persist category mapping");
                }
            }
            MappingDecision::Unmapped { reason } => {
                info!(%path, ?reason, "Category left unmapped");
                // A forced re-map the model rejects retires the decision it replaced
                let answered = matches!(
                    reason,
                    UnmappedReason::Hallucinated | UnmappedReason::NoConfidentMatch
                );
                if self.settings.force_refresh_mapping && answered {
                    if let Err(e) = active.cache.remove(path) {
                        warn!(%path, error = %e, "Could not drop stale category mapping");
                    }
                }
            }
        }

        ResolvedCategory {
            decision: outcome.decision,
            usage: outcome.usage,
            from_cache: false,
        }
    }

    /// Most specific cached decision for `path`, without any model call
    pub fn lookup_cached(&self, path: &CategoryPath) -> Option<MappingDecision> {
        self.active
            .as_ref()
            .and_then(|active| active.cache.lookup_with_fallback(path))
            .filter(|decision| decision.is_mapped())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::Utc;
    use shelfmark_core::{LlmError, MemoryStore};
    use shelfmark_llm::{MockCompletionProvider, MockEmbeddingProvider};
    use shelfmark_taxonomy::{IndexDocument, TaxonomyDocument};

    fn hammers() -> CategoryPath {
        CategoryPath::parse("Tools > Hand Tools > Hammers").unwrap()
    }

    fn claw_hammer() -> Product {
        Product::new("Claw Hammer", "Forged steel hammer for framing")
    }

    #[tokio::test]
    async fn test_mapped_decision_is_cached_for_later_products() {
        let completions = Arc::new(MockCompletionProvider::new());
        completions.respond_to(MAPPING_CALL, mapping_response(HAMMERS_ID));
        let store = MemoryStore::<MappingCacheDocument>::new();
        let mut resolver = active_resolver(
            completions.clone(),
            Arc::new(MockEmbeddingProvider::new()),
            store.clone(),
            ResolverSettings::default(),
        )
        .await;

        let first = resolver.resolve(&hammers(), &claw_hammer()).await;
        assert_eq!(first.decision.external_id(), Some(HAMMERS_ID));
        assert_eq!(first.decision.external_name(), Some("Hardware > Tools > Hammers"));
        assert!(!first.from_cache);
        assert!(first.usage.is_some());

        let second = resolver
            .resolve(&hammers(), &Product::new("Ball Peen Hammer", ""))
            .await;
        assert!(second.from_cache);
        assert_eq!(second.decision, first.decision);
        assert_eq!(completions.call_count(), 1);
        assert_eq!(store.snapshot().unwrap().mappings.len(), 1);
    }

    #[tokio::test]
    async fn test_hallucinated_id_is_returned_unmapped_and_not_stored() {
        let completions = Arc::new(MockCompletionProvider::new());
        completions.respond_to(MAPPING_CALL, mapping_response("ext-999"));
        let store = MemoryStore::<MappingCacheDocument>::new();
        let mut resolver = active_resolver(
            completions.clone(),
            Arc::new(MockEmbeddingProvider::new()),
            store.clone(),
            ResolverSettings::default(),
        )
        .await;

        let resolved = resolver.resolve(&hammers(), &claw_hammer()).await;
        assert_eq!(
            resolved.decision,
            MappingDecision::unmapped(UnmappedReason::Hallucinated)
        );
        assert_eq!(store.save_count(), 0);
        assert_eq!(resolver.lookup_cached(&hammers()), None);
    }

    #[tokio::test]
    async fn test_force_refresh_remaps_once_per_run() {
        let completions = Arc::new(MockCompletionProvider::new());
        completions.respond_to(MAPPING_CALL, mapping_response(HAMMERS_ID));
        let store = MemoryStore::<MappingCacheDocument>::new();
        let mut warm = active_resolver(
            completions.clone(),
            Arc::new(MockEmbeddingProvider::new()),
            store.clone(),
            ResolverSettings::default(),
        )
        .await;
        warm.resolve(&hammers(), &claw_hammer()).await;
        assert_eq!(completions.call_count(), 1);

        let settings = ResolverSettings {
            force_refresh_mapping: true,
            ..ResolverSettings::default()
        };
        let mut forced = active_resolver(
            completions.clone(),
            Arc::new(MockEmbeddingProvider::new()),
            store.clone(),
            settings,
        )
        .await;
        assert!(!forced.resolve(&hammers(), &claw_hammer()).await.from_cache);
        assert!(forced.resolve(&hammers(), &claw_hammer()).await.from_cache);
        assert_eq!(completions.call_count(), 2);
    }

    #[tokio::test]
    async fn test_forced_remap_rejection_replaces_cached_mapping() {
        let store = MemoryStore::<MappingCacheDocument>::new();
        let warm_completions = Arc::new(MockCompletionProvider::new());
        warm_completions.respond_to(MAPPING_CALL, mapping_response(HAMMERS_ID));
        let mut warm = active_resolver(
            warm_completions,
            Arc::new(MockEmbeddingProvider::new()),
            store.clone(),
            ResolverSettings::default(),
        )
        .await;
        warm.resolve(&hammers(), &claw_hammer()).await;
        assert_eq!(store.snapshot().unwrap().mappings.len(), 1);

        let completions = Arc::new(MockCompletionProvider::new());
        completions.respond_to(MAPPING_CALL, mapping_response("ext-999"));
        let settings = ResolverSettings {
            force_refresh_mapping: true,
            ..ResolverSettings::default()
        };
        let mut forced = active_resolver(
            completions.clone(),
            Arc::new(MockEmbeddingProvider::new()),
            store.clone(),
            settings,
        )
        .await;

        let rejected = MappingDecision::unmapped(UnmappedReason::Hallucinated);
        let first = forced.resolve(&hammers(), &claw_hammer()).await;
        assert_eq!(first.decision, rejected);
        assert!(!first.from_cache);

        let second = forced
            .resolve(&hammers(), &Product::new("Ball Peen Hammer", ""))
            .await;
        assert_eq!(second.decision, rejected);
        assert_eq!(second.usage, None);
        assert_eq!(completions.call_count(), 1);

        // The stale mapping is gone for backfill and for later runs
        assert_eq!(forced.lookup_cached(&hammers()), None);
        assert!(store.snapshot().unwrap().mappings.is_empty());
    }

    #[tokio::test]
    async fn test_unplaceable_category_is_mapped_once_per_run() {
        let completions = Arc::new(MockCompletionProvider::new());
        completions.respond_to(
            MAPPING_CALL,
            r#"{"category_id": null, "confidence": "low", "rationale": "nothing fits"}"#,
        );
        let embedder = Arc::new(MockEmbeddingProvider::new());
        let mut resolver = active_resolver(
            completions.clone(),
            embedder.clone(),
            MemoryStore::<MappingCacheDocument>::new(),
            ResolverSettings::default(),
        )
        .await;
        let embedded_for_index = embedder.texts_embedded();

        for title in ["Claw Hammer", "Sledge", "Mallet"] {
            let resolved = resolver.resolve(&hammers(), &Product::new(title, "")).await;
            assert_eq!(
                resolved.decision.unmapped_reason(),
                Some(&UnmappedReason::NoConfidentMatch)
            );
        }
        assert_eq!(completions.call_count(), 1);
        assert_eq!(embedder.texts_embedded(), embedded_for_index + 1);

        // A different category still gets its own call
        let saws = CategoryPath::parse("Tools > Hand Tools > Saws").unwrap();
        resolver.resolve(&saws, &Product::new("Hand Saw", "")).await;
        assert_eq!(completions.call_count(), 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_leaves_category_unmapped() {
        let completions = Arc::new(MockCompletionProvider::new());
        let embedder = Arc::new(MockEmbeddingProvider::new());
        let mut resolver = active_resolver(
            completions.clone(),
            embedder.clone(),
            MemoryStore::<MappingCacheDocument>::new(),
            ResolverSettings::default(),
        )
        .await;
        embedder.fail_with(LlmError::Transport("connection reset".to_string()));

        let resolved = resolver.resolve(&hammers(), &claw_hammer()).await;
        assert_eq!(
            resolved.decision.unmapped_reason(),
            Some(&UnmappedReason::MappingFailed)
        );
        assert_eq!(completions.call_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_cached_falls_back_to_broader_path() {
        let completions = Arc::new(MockCompletionProvider::new());
        completions.respond_to(MAPPING_CALL, mapping_response("gid://shopify/TaxonomyCategory/hw-1"));
        let mut resolver = active_resolver(
            completions,
            Arc::new(MockEmbeddingProvider::new()),
            MemoryStore::<MappingCacheDocument>::new(),
            ResolverSettings::default(),
        )
        .await;
        let broad = CategoryPath::parse("Tools > Hand Tools").unwrap();
        resolver.resolve(&broad, &claw_hammer()).await;

        let found = resolver.lookup_cached(&hammers()).unwrap();
        assert_eq!(found.external_name(), Some("Hardware > Tools"));
        assert_eq!(
            resolver.lookup_cached(&CategoryPath::parse("Garden > Hoses").unwrap()),
            None
        );
    }

    #[tokio::test]
    async fn test_disabled_resolver_never_calls_out() {
        let mut resolver = CategoryResolver::disabled();
        assert!(!resolver.is_enabled());
        let resolved = resolver.resolve(&hammers(), &claw_hammer()).await;
        assert_eq!(
            resolved.decision,
            MappingDecision::unmapped(UnmappedReason::MappingDisabled)
        );
        assert_eq!(resolver.lookup_cached(&hammers()), None);
    }

    #[tokio::test]
    async fn test_prepare_from_fresh_taxonomy_cache() {
        let taxonomy_store = MemoryStore::<TaxonomyDocument>::with_document(TaxonomyDocument {
            cached_at: Utc::now(),
            source: "test".to_string(),
            version: "latest".to_string(),
            categories: external_taxonomy().categories().to_vec(),
        });
        // Unroutable URL: a fetch attempt would disable mapping
        let source =
            ExternalTaxonomySource::new("http://127.0.0.1:9/categories.txt", 30, Arc::new(taxonomy_store));
        let index_store = EmbeddingIndexStore::new(Arc::new(MemoryStore::<IndexDocument>::new()), 16);
        let embedder = Arc::new(MockEmbeddingProvider::new());

        let resolver = CategoryResolver::prepare(
            MappingSetup {
                source: &source,
                index_store: &index_store,
                embedder: embedder.clone(),
                mapper: CategoryMapper::new(Arc::new(MockCompletionProvider::new()), 1024),
                mapping_store: Arc::new(MemoryStore::<MappingCacheDocument>::new()),
                internal_fingerprint: "internal-fp".to_string(),
            },
            ResolverSettings::default(),
        )
        .await;

        assert!(resolver.is_enabled());
        assert_eq!(embedder.texts_embedded(), 4);
    }

    #[tokio::test]
    async fn test_prepare_without_taxonomy_disables_mapping() {
        let source = ExternalTaxonomySource::new(
            "http://127.0.0.1:9/categories.txt",
            30,
            Arc::new(MemoryStore::<TaxonomyDocument>::new()),
        );
        let index_store = EmbeddingIndexStore::new(Arc::new(MemoryStore::<IndexDocument>::new()), 16);
        let embedder = Arc::new(MockEmbeddingProvider::new());

        let resolver = CategoryResolver::prepare(
            MappingSetup {
                source: &source,
                index_store: &index_store,
                embedder: embedder.clone(),
                mapper: CategoryMapper::new(Arc::new(MockCompletionProvider::new()), 1024),
                mapping_store: Arc::new(MemoryStore::<MappingCacheDocument>::new()),
                internal_fingerprint: "internal-fp".to_string(),
            },
            ResolverSettings::default(),
        )
        .await;

        assert!(!resolver.is_enabled());
        assert_eq!(embedder.texts_embedded(), 0);
    }
}
