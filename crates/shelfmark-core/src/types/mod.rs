//! Domain types shared across the enrichment engine

pub mod batch;
pub mod cache;
pub mod product;
pub mod taxonomy;

pub use batch::{BatchJob, BatchRequest, BatchStatus, SubRequestOutcome};
pub use cache::EnhancementCacheEntry;
pub use product::{
    Image, Metafield, Product, PurchaseOption, Variant, WeightData, WeightEstimate,
};
pub use taxonomy::{
    CategoryPath, Confidence, ExternalCategory, MappingDecision, UnmappedReason, PATH_SEPARATOR,
};
