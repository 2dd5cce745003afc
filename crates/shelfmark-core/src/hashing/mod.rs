//! Content fingerprints
//!
//! Every persisted artifact decides whether it is still valid by comparing a
//! SHA-256 fingerprint of its inputs: products by title and description,
//! the external taxonomy by its sorted id/name pairs, and our own taxonomy
//! document by its raw bytes.

pub mod sha256;

pub use sha256::{
    content_fingerprint, file_fingerprint, product_fingerprint, taxonomy_fingerprint,
    Sha256Hasher, SHA256_HASHER,
};
