use crate::components::{
    BatchConfig, EmbeddingConfig, MappingConfig, PacingConfig, PathsConfig, ProviderConfig,
};
use serde::{Deserialize, Serialize};

/// Root configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfmarkConfig {
    /// Completion provider used for enhancement and mapping
    pub provider: ProviderConfig,
    /// Embedding provider used for the taxonomy index
    pub embedding: EmbeddingConfig,
    /// External category mapping
    pub mapping: MappingConfig,
    /// Interactive-path backpressure
    pub pacing: PacingConfig,
    /// Asynchronous batch mode
    pub batch: BatchConfig,
    /// Cache and document locations
    pub paths: PathsConfig,
}
