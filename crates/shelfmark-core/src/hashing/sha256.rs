//! SHA-256 fingerprinting
//!
//! Fingerprints are lowercase hex digests. Only fields whose change should
//! invalidate cached work go into a fingerprint; price, inventory and images
//! are deliberately absent from the product basis.

use crate::types::{ExternalCategory, Product};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Separator between title and description in the product fingerprint basis
const CONTENT_SEPARATOR: &str = "||";

/// Stateless SHA-256 hasher producing hex digests
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Sha256Hasher {
    /// Hex digest of raw bytes
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Hex digest of a UTF-8 string
    pub fn hash_str(&self, data: &str) -> String {
        self.hash_bytes(data.as_bytes())
    }

    pub fn algorithm_name(&self) -> &'static str {
        "sha256"
    }
}

/// Shared hasher instance
pub const SHA256_HASHER: Sha256Hasher = Sha256Hasher;

/// Fingerprint of a title/description pair
pub fn content_fingerprint(title: &str, description: &str) -> String {
    SHA256_HASHER.hash_str(&format!("{title}{CONTENT_SEPARATOR}{description}"))
}

/// Fingerprint of the fields of a product that drive enhancement
pub fn product_fingerprint(product: &Product) -> String {
    content_fingerprint(&product.title, &product.description)
}

/// Fingerprint of an external taxonomy, independent of input order.
///
/// Entries are sorted by full name then id and serialized as a JSON array of
/// `{"fullName", "id"}` objects with sorted keys.
pub fn taxonomy_fingerprint(categories: &[ExternalCategory]) -> String {
    let mut sorted: Vec<&ExternalCategory> = categories.iter().collect();
    sorted.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.id.cmp(&b.id)));

    let basis: Vec<BTreeMap<&str, &str>> = sorted
        .into_iter()
        .map(|c| BTreeMap::from([("fullName", c.full_name.as_str()), ("id", c.id.as_str())]))
        .collect();

    // Serializing borrowed string maps cannot fail
    let json = serde_json::to_string(&basis).unwrap_or_default();
    SHA256_HASHER.hash_str(&json)
}

/// Fingerprint of a file's raw bytes
pub fn file_fingerprint(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(SHA256_HASHER.hash_bytes(&bytes))
}
