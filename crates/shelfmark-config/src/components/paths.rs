use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Locations of persisted caches and input documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding every cache file
    pub cache_dir: PathBuf,
    /// Enhancement cache file name
    pub enhancement_cache: String,
    /// Mapping cache file name
    pub mapping_cache: String,
    /// Embedding index file name
    pub embedding_index: String,
    /// Cached external taxonomy file name
    pub external_taxonomy: String,
    /// Our taxonomy document (Markdown)
    pub taxonomy_doc: PathBuf,
    /// Voice and tone guidelines (Markdown)
    pub voice_tone_doc: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            enhancement_cache: "enhanced_cache.json".to_string(),
            mapping_cache: "taxonomy_mapping.json".to_string(),
            embedding_index: "taxonomy_embeddings.json".to_string(),
            external_taxonomy: "external_taxonomy.json".to_string(),
            taxonomy_doc: PathBuf::from("docs/TAXONOMY.md"),
            voice_tone_doc: PathBuf::from("docs/VOICE_AND_TONE_GUIDELINES.md"),
        }
    }
}

impl PathsConfig {
    /// Full path of the enhancement cache
    pub fn enhancement_cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.enhancement_cache)
    }

    /// Full path of the mapping cache
    pub fn mapping_cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.mapping_cache)
    }

    /// Full path of the embedding index
    pub fn embedding_index_path(&self) -> PathBuf {
        self.cache_dir.join(&self.embedding_index)
    }

    /// Full path of the cached external taxonomy
    pub fn external_taxonomy_path(&self) -> PathBuf {
        self.cache_dir.join(&self.external_taxonomy)
    }
}
