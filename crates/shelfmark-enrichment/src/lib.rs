//! # Shelfmark Enrichment
//!
//! Turns raw product records into enriched ones: category, shipping weight,
//! purchase options, a rewritten description and an external category.
//!
//! ## Execution modes
//!
//! - [`Orchestrator`]: sequential, paced, fail-fast. Every product either
//!   hits the [`EnhancementCache`] or costs one taxonomy call and one
//!   description call.
//! - [`BatchCoordinator`]: the same prompts submitted as two dependent batch
//!   jobs, joined back to products by correlation id.
//!
//! Both consult the enhancement cache first and map categories through the
//! [`CategoryResolver`], which narrows the external taxonomy before asking a
//! model and caches what it accepts.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let cache = EnhancementCache::load(Arc::new(JsonFileStore::new(cache_path)));
//! let mut orchestrator = Orchestrator::new(provider, cache, resolver, documents, options);
//! let run = orchestrator.run(products).await?;
//! println!("{} enhanced, {} from cache", run.summary.enhanced, run.summary.cached);
//! ```

pub mod batch;
pub mod cache;
pub mod error;
pub mod options;
pub mod orchestrator;
pub mod patch;
pub mod prompts;
pub mod resolver;
pub mod response;

mod steps;

#[cfg(test)]
mod test_support;

pub use batch::{BatchCoordinator, BatchRun, ProductFailure};
pub use cache::{CacheLookup, EnhancementCache, EnhancementCacheDocument, CACHE_VERSION};
pub use error::{EnrichmentError, EnrichmentResult};
pub use options::{EnrichmentOptions, PromptDocuments, RunSummary};
pub use orchestrator::{EnrichmentRun, Orchestrator};
pub use resolver::{CategoryResolver, MappingSetup, ResolvedCategory, ResolverSettings};
pub use response::{parse_taxonomy_response, TaxonomyAssignment};
