use shelfmark_core::{LlmError, StoreError};
use std::path::PathBuf;

/// Errors from taxonomy loading, indexing and mapping
#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("Failed to read taxonomy document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Embedding failed: {0}")]
    Embedding(#[from] LlmError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Embedding response incomplete: {0}")]
    IncompleteEmbeddings(String),
}

pub type TaxonomyResult<T> = Result<T, TaxonomyError>;
