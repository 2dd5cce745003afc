//! Configuration sections

mod batch;
mod embedding;
mod mapping;
mod pacing;
mod paths;
mod provider;

pub use batch::BatchConfig;
pub use embedding::EmbeddingConfig;
pub use mapping::MappingConfig;
pub use pacing::PacingConfig;
pub use paths::PathsConfig;
pub use provider::{ProviderConfig, ProviderKind};

pub(crate) fn default_true() -> bool {
    true
}
