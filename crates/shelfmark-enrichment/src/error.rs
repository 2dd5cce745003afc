use shelfmark_core::{LlmError, ShelfmarkError, StoreError};

/// Errors surfaced by an enrichment run
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    /// Fail-fast abort; identifies the product so the run can be resumed
    /// from the cache after the cause is fixed
    #[error("Enhancement failed for product {index}/{total} '{title}': {source}")]
    ProductFailed {
        /// 1-based position in the input
        index: usize,
        total: usize,
        title: String,
        #[source]
        source: Box<EnrichmentError>,
    },

    #[error("Model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed model response: {0}")]
    Malformed(String),

    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    #[error("Cache error: {0}")]
    Cache(#[from] StoreError),

    #[error("Batch sub-request failed: {0}")]
    SubRequest(String),

    #[error("Batch job {job_id} failed: {status}")]
    BatchFailed { job_id: String, status: String },

    #[error(transparent)]
    Domain(#[from] ShelfmarkError),
}

impl EnrichmentError {
    /// Position and title of the failing product, for fail-fast errors
    pub fn failed_product(&self) -> Option<(usize, &str)> {
        match self {
            Self::ProductFailed { index, title, .. } => Some((*index, title.as_str())),
            _ => None,
        }
    }
}

pub type EnrichmentResult<T> = Result<T, EnrichmentError>;
