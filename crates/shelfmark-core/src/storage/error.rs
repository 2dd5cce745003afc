use std::path::PathBuf;
use thiserror::Error;

/// Errors from document persistence
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupted document at {location}: {reason}")]
    Corrupt { location: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
