//! Parsing of enhancement responses

use crate::error::{EnrichmentError, EnrichmentResult};
use serde::Deserialize;
use shelfmark_core::{strip_code_fence, CategoryPath, PurchaseOption, WeightEstimate};
use tracing::warn;

/// Everything the taxonomy call decides about a product
#[derive(Debug, Clone, PartialEq)]
pub struct TaxonomyAssignment {
    pub path: CategoryPath,
    pub reasoning: String,
    pub weight: WeightEstimate,
    pub purchase_options: Vec<PurchaseOption>,
    pub needs_review: bool,
}

#[derive(Debug, Deserialize)]
struct RawAssignment {
    #[serde(default)]
    department: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    weight_estimation: WeightEstimate,
    #[serde(default)]
    purchase_options: Vec<PurchaseOption>,
    #[serde(default)]
    needs_review: bool,
}

/// Parses the taxonomy call's JSON answer, tolerating a Markdown code fence.
///
/// A missing department or category, or a purchase option outside 1..=5,
/// makes the whole response malformed.
pub fn parse_taxonomy_response(text: &str) -> EnrichmentResult<TaxonomyAssignment> {
    let body = strip_code_fence(text);
    let raw: RawAssignment = serde_json::from_str(body)
        .map_err(|e| EnrichmentError::Malformed(format!("taxonomy response is not valid JSON: {e}")))?;

    let path = CategoryPath::new(&raw.department, &raw.category, raw.subcategory.as_deref())
        .map_err(|e| EnrichmentError::Malformed(e.to_string()))?;

    let mut purchase_options = raw.purchase_options;
    purchase_options.sort();
    purchase_options.dedup();

    Ok(TaxonomyAssignment {
        path,
        reasoning: raw.reasoning,
        weight: raw.weight_estimation,
        purchase_options,
        needs_review: raw.needs_review,
    })
}

/// Rewritten description with any code fence removed, or the original when
/// the model returned nothing usable
pub fn description_or_fallback(text: &str, original: &str, title: &str) -> String {
    let body = strip_code_fence(text);
    if body.is_empty() {
        warn!(product = %title, "Empty rewritten description; keeping the original");
        return original.to_string();
    }
    body.to_string()
}
