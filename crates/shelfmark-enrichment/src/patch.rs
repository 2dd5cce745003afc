//! Applying enhancement results to product records

use crate::response::TaxonomyAssignment;
use serde_json::{json, Value};
use shelfmark_core::{
    CategoryPath, EnhancementCacheEntry, MappingDecision, Metafield, Product, PurchaseOption,
    WeightData,
};
use tracing::debug;

const METAFIELD_NAMESPACE: &str = "custom";

/// `[category, subcategory?]` followed by existing tags that are neither
/// already present nor the department
pub fn merge_tags(path: &CategoryPath, existing: &[String]) -> Vec<String> {
    let mut tags = vec![path.category().to_string()];
    if let Some(sub) = path.subcategory() {
        tags.push(sub.to_string());
    }
    for tag in existing {
        if !tag.is_empty() && !tags.contains(tag) && tag != path.department() {
            tags.push(tag.clone());
        }
    }
    tags
}

/// Writes a fresh enhancement onto `product`
pub fn apply_enhancement(product: &mut Product, assignment: &TaxonomyAssignment, description: String) {
    product.product_type = Some(assignment.path.department().to_string());
    product.tags = merge_tags(&assignment.path, &product.tags);
    product.description = description;

    let ships = PurchaseOption::ships(&assignment.purchase_options);
    let pounds = assignment.weight.final_shipping_weight;
    for variant in &mut product.variants {
        variant.set_shipping_weight(pounds);
        // Weight notes only matter for products a carrier will pick up
        variant.weight_data = ships.then(|| WeightData {
            estimate: assignment.weight.clone(),
            needs_review: assignment.needs_review,
        });
    }
    debug!(
        product = %product.title,
        variants = product.variants.len(),
        pounds,
        "Applied shipping weight"
    );

    product.purchase_options = assignment.purchase_options.clone();
    product.needs_review = Some(assignment.needs_review);

    product.add_metafield_if_absent(Metafield {
        namespace: METAFIELD_NAMESPACE.to_string(),
        key: "hide_online_price".to_string(),
        value: json!("true"),
        field_type: Some("boolean".to_string()),
    });
    let labels = PurchaseOption::label_map(&assignment.purchase_options);
    product.add_metafield_if_absent(Metafield {
        namespace: METAFIELD_NAMESPACE.to_string(),
        key: "purchase_options".to_string(),
        value: Value::String(json!(labels).to_string()),
        field_type: Some("json".to_string()),
    });
}

/// Restores a cached enhancement onto an unchanged product
pub fn apply_cached(product: &mut Product, entry: &EnhancementCacheEntry) {
    product.product_type = Some(entry.department.clone());
    match entry.category_path() {
        Some(path) => product.tags = merge_tags(&path, &product.tags),
        None => {
            product.tags = [Some(entry.category.as_str()), entry.subcategory.as_deref()]
                .into_iter()
                .flatten()
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    product.description = entry.enhanced_description.clone();
    product.external_category_id = entry.external_category_id.clone();
    product.external_category = entry.external_category_name.clone();
}

/// Sets the external category fields from a decision; unmapped clears them
pub fn apply_mapping(product: &mut Product, decision: &MappingDecision) {
    product.external_category_id = decision.external_id().map(str::to_string);
    product.external_category = decision.external_name().map(str::to_string);
}
