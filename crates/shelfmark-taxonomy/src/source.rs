//! External taxonomy source
//!
//! The external list is published as plain text, one category per line:
//!
//! ```text
//! gid://shopify/TaxonomyCategory/hg-11-4 : Home & Garden > Lawn & Garden > Gardening
//! ```
//!
//! A fetched copy is cached locally and reused while fresh. When the fetch
//! fails, a stale cache is better than nothing; with no cache at all the
//! run proceeds with an empty taxonomy and mapping is disabled.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shelfmark_core::{taxonomy_fingerprint, DocumentStore, ExternalCategory};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const ID_PREFIX: &str = "gid://shopify/TaxonomyCategory/";
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Cached copy of the external taxonomy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyDocument {
    pub cached_at: DateTime<Utc>,
    pub source: String,
    pub version: String,
    pub categories: Vec<ExternalCategory>,
}

/// Where the loaded taxonomy came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyOrigin {
    FreshCache,
    Fetched,
    StaleCache,
    /// Nothing could be loaded; mapping is disabled for the run
    Unavailable,
}

/// The external taxonomy loaded for one run.
///
/// Read-only once built. The id set here is the authority every mapping
/// decision is validated against.
#[derive(Debug, Clone)]
pub struct ExternalTaxonomy {
    categories: Vec<ExternalCategory>,
    by_id: HashMap<String, usize>,
    fingerprint: String,
    origin: TaxonomyOrigin,
}

impl ExternalTaxonomy {
    pub fn new(categories: Vec<ExternalCategory>, origin: TaxonomyOrigin) -> Self {
        let by_id = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        let fingerprint = taxonomy_fingerprint(&categories);
        Self {
            categories,
            by_id,
            fingerprint,
            origin,
        }
    }

    /// An empty taxonomy; mapping is disabled
    pub fn unavailable() -> Self {
        Self::new(Vec::new(), TaxonomyOrigin::Unavailable)
    }

    pub fn categories(&self) -> &[ExternalCategory] {
        &self.categories
    }

    pub fn get(&self, id: &str) -> Option<&ExternalCategory> {
        self.by_id.get(id).map(|&i| &self.categories[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn origin(&self) -> TaxonomyOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Parses the published `id : Full > Name` list, skipping anything else
pub fn parse_categories(text: &str) -> Vec<ExternalCategory> {
    text.lines()
        .filter_map(|line| {
            let (id, full_name) = line.trim().split_once(" : ")?;
            let (id, full_name) = (id.trim(), full_name.trim());
            (id.starts_with(ID_PREFIX) && !full_name.is_empty())
                .then(|| ExternalCategory::new(id, full_name))
        })
        .collect()
}

/// Loads the external taxonomy through a local freshness cache
pub struct ExternalTaxonomySource {
    client: reqwest::Client,
    url: String,
    freshness: Duration,
    store: Arc<dyn DocumentStore<TaxonomyDocument>>,
}

impl ExternalTaxonomySource {
    pub fn new(
        url: impl Into<String>,
        freshness_days: u32,
        store: Arc<dyn DocumentStore<TaxonomyDocument>>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            freshness: Duration::days(i64::from(freshness_days)),
            store,
        }
    }

    /// Loads the taxonomy. Never fails; see [`TaxonomyOrigin`] for how it
    /// degrades.
    pub async fn load(&self) -> ExternalTaxonomy {
        self.load_at(Utc::now()).await
    }

    /// [`load`](Self::load) with an explicit notion of "now"
    pub async fn load_at(&self, now: DateTime<Utc>) -> ExternalTaxonomy {
        let cached = match self.store.load() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable taxonomy cache");
                None
            }
        };

        if let Some(doc) = &cached {
            let age = now - doc.cached_at;
            if age < self.freshness && !doc.categories.is_empty() {
                info!(
                    categories = doc.categories.len(),
                    age_days = age.num_days(),
                    "Using cached external taxonomy"
                );
                return ExternalTaxonomy::new(doc.categories.clone(), TaxonomyOrigin::FreshCache);
            }
        }

        match self.fetch().await {
            Ok(categories) if !categories.is_empty() => {
                info!(categories = categories.len(), url = %self.url, "Fetched external taxonomy");
                let doc = TaxonomyDocument {
                    cached_at: now,
                    source: self.url.clone(),
                    version: "latest".to_string(),
                    categories,
                };
                if let Err(e) = self.store.save(&doc) {
                    warn!(error = %e, "Failed to cache external taxonomy");
                }
                ExternalTaxonomy::new(doc.categories, TaxonomyOrigin::Fetched)
            }
            Ok(_) => self.fall_back(cached, "fetched taxonomy was empty"),
            Err(reason) => self.fall_back(cached, &reason),
        }
    }

    fn fall_back(&self, cached: Option<TaxonomyDocument>, reason: &str) -> ExternalTaxonomy {
        match cached.filter(|doc| !doc.categories.is_empty()) {
            Some(doc) => {
                warn!(
                    reason,
                    categories = doc.categories.len(),
                    cached_at = %doc.cached_at,
                    "Taxonomy fetch failed, using stale cache"
                );
                ExternalTaxonomy::new(doc.categories, TaxonomyOrigin::StaleCache)
            }
            None => {
                warn!(reason, "Taxonomy fetch failed and no cache exists; category mapping disabled");
                ExternalTaxonomy::unavailable()
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<ExternalCategory>, String> {
        let response = self
            .client
            .get(&self.url)
            .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(parse_categories(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfmark_core::MemoryStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = "\
# Shopify Product Taxonomy - Categories: 2025-03
ap : Animals & Pet Supplies
gid://shopify/TaxonomyCategory/ap : Animals & Pet Supplies
gid://shopify/TaxonomyCategory/ap-2 : Animals & Pet Supplies > Pet Supplies

gid://shopify/TaxonomyCategory/hg-11 : Home & Garden > Lawn & Garden
";

    fn cached(age_days: i64, now: DateTime<Utc>) -> TaxonomyDocument {
        TaxonomyDocument {
            cached_at: now - Duration::days(age_days),
            source: "test".to_string(),
            version: "latest".to_string(),
            categories: vec![ExternalCategory::new(format!("{ID_PREFIX}old"), "Old > Entry")],
        }
    }

    async fn serve(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories.txt"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_parse_categories_skips_noise() {
        let categories = parse_categories(LISTING);
        assert_eq!(categories.len(), 3);
        assert_eq!(categories[1].full_name, "Animals & Pet Supplies > Pet Supplies");
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .expect(0)
            .mount(&server)
            .await;

        let now = Utc::now();
        let store = Arc::new(MemoryStore::with_document(cached(3, now)));
        let source = ExternalTaxonomySource::new(format!("{}/categories.txt", server.uri()), 30, store);

        let taxonomy = source.load_at(now).await;
        assert_eq!(taxonomy.origin(), TaxonomyOrigin::FreshCache);
        assert_eq!(taxonomy.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_is_refetched_and_saved() {
        let server = serve(200, LISTING).await;
        let now = Utc::now();
        let store = Arc::new(MemoryStore::with_document(cached(45, now)));
        let source = ExternalTaxonomySource::new(
            format!("{}/categories.txt", server.uri()),
            30,
            store.clone(),
        );

        let taxonomy = source.load_at(now).await;
        assert_eq!(taxonomy.origin(), TaxonomyOrigin::Fetched);
        assert_eq!(taxonomy.len(), 3);
        assert!(taxonomy.contains("gid://shopify/TaxonomyCategory/hg-11"));
        assert_eq!(store.snapshot().unwrap().cached_at, now);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_stale_cache() {
        let server = serve(503, "unavailable").await;
        let now = Utc::now();
        let store = Arc::new(MemoryStore::with_document(cached(90, now)));
        let source = ExternalTaxonomySource::new(format!("{}/categories.txt", server.uri()), 30, store);

        let taxonomy = source.load_at(now).await;
        assert_eq!(taxonomy.origin(), TaxonomyOrigin::StaleCache);
        assert_eq!(taxonomy.categories()[0].full_name, "Old > Entry");
    }

    #[tokio::test]
    async fn test_no_cache_and_no_network_disables_mapping() {
        let server = serve(500, "").await;
        let source = ExternalTaxonomySource::new(
            format!("{}/categories.txt", server.uri()),
            30,
            Arc::new(MemoryStore::<TaxonomyDocument>::new()),
        );

        let taxonomy = source.load().await;
        assert_eq!(taxonomy.origin(), TaxonomyOrigin::Unavailable);
        assert!(taxonomy.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_treated_as_missing() {
        let server = serve(200, LISTING).await;
        let source = ExternalTaxonomySource::new(
            format!("{}/categories.txt", server.uri()),
            30,
            Arc::new(MemoryStore::<TaxonomyDocument>::corrupted()),
        );

        let taxonomy = source.load().await;
        assert_eq!(taxonomy.origin(), TaxonomyOrigin::Fetched);
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let mut categories = parse_categories(LISTING);
        let a = ExternalTaxonomy::new(categories.clone(), TaxonomyOrigin::Fetched);
        categories.reverse();
        let b = ExternalTaxonomy::new(categories, TaxonomyOrigin::Fetched);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
