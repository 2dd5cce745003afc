//! # Shelfmark Core
//!
//! Domain model and abstractions shared by every shelfmark crate.
//!
//! ## Architecture
//!
//! Core owns the vocabulary of the enrichment engine and nothing that talks to
//! the network:
//! - **types**: products, category paths, external categories, mapping
//!   decisions, cache entries and the batch job state machine
//! - **hashing**: SHA-256 fingerprints for products, taxonomies and files
//! - **traits**: capability seams (`CompletionProvider`, `EmbeddingProvider`,
//!   `BatchBackend`, `Sleeper`) implemented by `shelfmark-llm` and test fakes
//! - **storage**: self-describing persisted documents behind `DocumentStore`,
//!   with an atomic JSON file store and an in-memory store for tests
//!
//! Higher-level crates receive implementations of these traits by injection;
//! core never constructs a provider itself.

pub mod hashing;
pub mod storage;
pub mod text;
pub mod traits;
pub mod types;

pub use hashing::{
    content_fingerprint, file_fingerprint, product_fingerprint, taxonomy_fingerprint,
    Sha256Hasher, SHA256_HASHER,
};
pub use storage::{DocumentStore, JsonFileStore, MemoryStore, StoreError, StoreResult};
pub use text::strip_code_fence;
pub use traits::{
    BackendStatus, BatchBackend, BatchResultItem, BatchSnapshot, Completion, CompletionProvider,
    CompletionRequest, EmbeddingProvider, LlmError, LlmResult, RequestCounts, Sleeper,
    TokenUsage, TokioSleeper,
};
pub use types::{
    BatchJob, BatchRequest, BatchStatus, CategoryPath, Confidence, EnhancementCacheEntry,
    ExternalCategory, Image, MappingDecision, Metafield, Product, PurchaseOption,
    SubRequestOutcome, UnmappedReason, Variant, WeightData, WeightEstimate,
};

/// Errors raised by core domain operations
#[derive(Debug, thiserror::Error)]
pub enum ShelfmarkError {
    #[error("Invalid product: {0}")]
    InvalidProduct(String),

    #[error("Invalid category path: {0}")]
    InvalidCategoryPath(String),

    #[error("Invalid batch transition: {from:?} -> {to:?}")]
    InvalidTransition { from: BatchStatus, to: BatchStatus },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

pub type Result<T> = std::result::Result<T, ShelfmarkError>;
