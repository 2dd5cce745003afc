//! # Shelfmark Taxonomy
//!
//! Everything needed to map one of our category paths onto a large external
//! taxonomy without showing the whole taxonomy to a model.
//!
//! ## Pipeline
//!
//! 1. [`ExternalTaxonomySource`] loads the external category list (fresh
//!    cache, network, stale cache, or nothing at all)
//! 2. [`EmbeddingIndexStore`] returns a vector per category, rebuilding only
//!    when the taxonomy fingerprint or embedding model changed
//! 3. [`narrow`] picks the top-k categories closest to a product query
//! 4. [`CategoryMapper`] asks a model to choose among those candidates and
//!    rejects any id outside the loaded taxonomy
//! 5. [`MappingCache`] remembers accepted decisions per category path,
//!    invalidated when either taxonomy changes
//!
//! [`InternalTaxonomy`] parses our own taxonomy document and supplies its
//! fingerprint for mapping-cache invalidation.

pub mod embedding_index;
pub mod error;
pub mod internal;
pub mod mapper;
pub mod mapping_cache;
pub mod narrower;
pub mod source;

pub use embedding_index::{
    EmbeddingIndex, EmbeddingIndexStore, EmbeddingRecord, IndexDocument, RebuildReason,
    INDEX_FORMAT_VERSION,
};
pub use error::{TaxonomyError, TaxonomyResult};
pub use internal::InternalTaxonomy;
pub use mapper::{validate_response, CategoryMapper, MappingContext, MappingOutcome};
pub use mapping_cache::{MappingCache, MappingCacheDocument, MAPPING_CACHE_VERSION};
pub use narrower::{build_query, cosine_similarity, narrow, rank, ScoredCategory};
pub use source::{ExternalTaxonomy, ExternalTaxonomySource, TaxonomyDocument, TaxonomyOrigin};
