//! Semantic narrowing of the external taxonomy
//!
//! Scores every indexed category against a product query by cosine
//! similarity and keeps the top k, so the mapping prompt stays small.

use crate::embedding_index::EmbeddingIndex;
use shelfmark_core::{CategoryPath, EmbeddingProvider, ExternalCategory, LlmResult, Product};
use tracing::debug;

/// One candidate with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCategory {
    pub category: ExternalCategory,
    pub score: f32,
}

/// Query text for a category path in the context of one product
pub fn build_query(path: &CategoryPath, product: &Product, excerpt_chars: usize) -> String {
    format!(
        "Category: {path}\nProduct: {}\nDescription: {}",
        product.title,
        product.description_excerpt(excerpt_chars)
    )
}

/// Cosine similarity; zero for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Top `k` records by descending similarity to `query`.
///
/// Equal scores are ordered by category id.
pub fn rank(query: &[f32], index: &EmbeddingIndex, k: usize) -> Vec<ScoredCategory> {
    let mut scored: Vec<(usize, f32)> = index
        .records()
        .iter()
        .enumerate()
        .map(|(i, record)| (i, cosine_similarity(query, &record.vector)))
        .collect();
    let records = index.records();
    scored.sort_by(|a, b| {
        b.1.total_cmp(&a.1)
            .then_with(|| records[a.0].id.cmp(&records[b.0].id))
    });

    scored
        .into_iter()
        .take(k)
        .map(|(i, score)| ScoredCategory {
            category: index.records()[i].category(),
            score,
        })
        .collect()
}

/// Embeds `query` and returns up to `k` closest categories, best first
pub async fn narrow(
    query: &str,
    index: &EmbeddingIndex,
    provider: &dyn EmbeddingProvider,
    k: usize,
) -> LlmResult<Vec<ScoredCategory>> {
    if index.is_empty() || k == 0 {
        return Ok(Vec::new());
    }
    let vector = provider.embed(query).await?;
    let ranked = rank(&vector, index, k);

    if let Some(top) = ranked.first() {
        debug!(
            candidates = ranked.len(),
            top = %top.category.full_name,
            score = top.score,
            "Narrowed external taxonomy"
        );
    }
    Ok(ranked)
}
