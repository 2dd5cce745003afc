//! Per-product steps shared by the interactive and batch paths

use crate::cache::{CacheLookup, EnhancementCache};
use crate::error::{EnrichmentError, EnrichmentResult};
use crate::options::RunSummary;
use crate::patch::{apply_cached, apply_enhancement, apply_mapping};
use crate::resolver::CategoryResolver;
use crate::response::TaxonomyAssignment;
use chrono::Utc;
use shelfmark_core::{product_fingerprint, EnhancementCacheEntry, Product};
use tracing::{debug, info};

/// Cache key and content fingerprint of a product that can be enhanced
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProductIdentity {
    pub key: String,
    pub fingerprint: String,
}

pub(crate) fn identify(product: &Product) -> EnrichmentResult<ProductIdentity> {
    if product.title.trim().is_empty() {
        return Err(EnrichmentError::InvalidProduct(
            "product has no title".to_string(),
        ));
    }
    let key = product.cache_key().ok_or_else(|| {
        EnrichmentError::InvalidProduct("product has no id, handle or title".to_string())
    })?;
    Ok(ProductIdentity {
        key,
        fingerprint: product_fingerprint(product),
    })
}

/// Restores `product` from the cache if its entry is still valid.
///
/// Returns `false` on a miss. A hit with no external category is backfilled
/// from the mapping cache without any model call.
pub(crate) fn restore_from_cache(
    cache: &mut EnhancementCache,
    resolver: &CategoryResolver,
    product: &mut Product,
    identity: &ProductIdentity,
    summary: &mut RunSummary,
) -> bool {
    let entry = match cache.lookup(&identity.key, &identity.fingerprint) {
        CacheLookup::Hit(entry) => entry.clone(),
        CacheLookup::Stale => {
            info!(product = %product.title, "Content changed since last enhancement");
            return false;
        }
        CacheLookup::Miss => {
            debug!(product = %product.title, "Not in enhancement cache");
            return false;
        }
    };

    info!(product = %product.title, "Using cached enhancement");
    apply_cached(product, &entry);
    summary.cached += 1;

    if entry.external_category_id.is_none() {
        let decision = entry
            .category_path()
            .and_then(|path| resolver.lookup_cached(&path));
        if let Some(decision) = decision {
            apply_mapping(product, &decision);
            if let (Some(id), Some(name)) = (decision.external_id(), decision.external_name()) {
                cache.set_external_category(&identity.key, id, name);
                info!(product = %product.title, external = %name, "Backfilled external category");
                summary.backfilled += 1;
            }
        }
    }
    true
}

/// Resolves the external category, patches the product and records the
/// enhancement in the cache
#[allow(clippy::too_many_arguments)]
pub(crate) async fn finish_enhancement(
    cache: &mut EnhancementCache,
    resolver: &mut CategoryResolver,
    product: &mut Product,
    identity: &ProductIdentity,
    assignment: &TaxonomyAssignment,
    description: String,
    provider: &str,
    model: &str,
    summary: &mut RunSummary,
) {
    // Mapping sees the product as supplied, before the rewrite
    let resolved = resolver.resolve(&assignment.path, product).await;
    if let Some(usage) = resolved.usage {
        summary.record_call(usage);
    }

    apply_enhancement(product, assignment, description);
    apply_mapping(product, &resolved.decision);
    if resolved.decision.is_mapped() {
        summary.mapped += 1;
    } else {
        summary.unmapped += 1;
    }

    cache.put(
        identity.key.clone(),
        EnhancementCacheEntry {
            enhanced_at: Utc::now(),
            input_hash: identity.fingerprint.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
            department: assignment.path.department().to_string(),
            category: assignment.path.category().to_string(),
            subcategory: assignment.path.subcategory().map(str::to_string),
            enhanced_description: product.description.clone(),
            external_category_id: resolved.decision.external_id().map(str::to_string),
            external_category_name: resolved.decision.external_name().map(str::to_string),
        },
    );
    summary.enhanced += 1;
}
