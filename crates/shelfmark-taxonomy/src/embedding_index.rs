//! Persisted embedding index over the external taxonomy
//!
//! One record per external category. The persisted document carries the
//! taxonomy fingerprint and embedding model it was built from; a document
//! that disagrees with the current taxonomy or model, or that is not
//! structurally complete, is rebuilt rather than trusted.

use crate::error::{TaxonomyError, TaxonomyResult};
use crate::source::ExternalTaxonomy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfmark_core::{DocumentStore, EmbeddingProvider, ExternalCategory};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Format version of the persisted index
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub full_name: String,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn category(&self) -> ExternalCategory {
        ExternalCategory::new(&self.id, &self.full_name)
    }
}

/// Persisted form of the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub version: u32,
    pub taxonomy_fingerprint: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    pub records: Vec<EmbeddingRecord>,
}

/// Why an index was (re)built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    Missing,
    Corrupt(String),
    VersionChanged,
    FingerprintChanged,
    ModelChanged { cached: String, current: String },
    Incomplete(String),
    Forced,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no index on disk"),
            Self::Corrupt(reason) => write!(f, "index unreadable: {reason}"),
            Self::VersionChanged => write!(f, "index format version changed"),
            Self::FingerprintChanged => write!(f, "external taxonomy changed"),
            Self::ModelChanged { cached, current } => {
                write!(f, "embedding model changed ({cached} -> {current})")
            }
            Self::Incomplete(reason) => write!(f, "index incomplete: {reason}"),
            Self::Forced => write!(f, "forced refresh"),
        }
    }
}

/// In-memory index for one run
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingIndex {
    taxonomy_fingerprint: String,
    model: String,
    dimensions: usize,
    records: Vec<EmbeddingRecord>,
}

impl EmbeddingIndex {
    pub(crate) fn from_document(doc: IndexDocument) -> Self {
        Self {
            taxonomy_fingerprint: doc.taxonomy_fingerprint,
            model: doc.embedding_model,
            dimensions: doc.dimensions,
            records: doc.records,
        }
    }

    fn to_document(&self, created_at: DateTime<Utc>) -> IndexDocument {
        IndexDocument {
            version: INDEX_FORMAT_VERSION,
            taxonomy_fingerprint: self.taxonomy_fingerprint.clone(),
            embedding_model: self.model.clone(),
            dimensions: self.dimensions,
            created_at,
            records: self.records.clone(),
        }
    }

    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    pub fn taxonomy_fingerprint(&self) -> &str {
        &self.taxonomy_fingerprint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Checks a persisted index against the current taxonomy and model
fn validate(
    doc: &IndexDocument,
    taxonomy: &ExternalTaxonomy,
    model: &str,
) -> Result<(), RebuildReason> {
    if doc.version != INDEX_FORMAT_VERSION {
        return Err(RebuildReason::VersionChanged);
    }
    if doc.taxonomy_fingerprint != taxonomy.fingerprint() {
        return Err(RebuildReason::FingerprintChanged);
    }
    if doc.embedding_model != model {
        return Err(RebuildReason::ModelChanged {
            cached: doc.embedding_model.clone(),
            current: model.to_string(),
        });
    }
    if doc.records.len() != taxonomy.len() {
        return Err(RebuildReason::Incomplete(format!(
            "{} records for {} categories",
            doc.records.len(),
            taxonomy.len()
        )));
    }
    if doc.dimensions == 0 {
        return Err(RebuildReason::Incomplete("zero dimensions".to_string()));
    }
    if let Some(bad) = doc.records.iter().find(|r| r.vector.len() != doc.dimensions) {
        return Err(RebuildReason::Incomplete(format!(
            "record {} has {} dimensions, expected {}",
            bad.id,
            bad.vector.len(),
            doc.dimensions
        )));
    }
    let ids: HashSet<&str> = doc.records.iter().map(|r| r.id.as_str()).collect();
    if ids.len() != doc.records.len() || !ids.iter().all(|id| taxonomy.contains(id)) {
        return Err(RebuildReason::Incomplete(
            "record ids do not match the taxonomy".to_string(),
        ));
    }
    Ok(())
}

/// Loads, validates and rebuilds the embedding index
pub struct EmbeddingIndexStore {
    store: Arc<dyn DocumentStore<IndexDocument>>,
    batch_size: usize,
}

impl EmbeddingIndexStore {
    pub fn new(store: Arc<dyn DocumentStore<IndexDocument>>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Returns an index mirroring `taxonomy` exactly, embedding with
    /// `provider` only if the persisted index cannot be trusted.
    pub async fn get_or_build(
        &self,
        taxonomy: &ExternalTaxonomy,
        provider: &dyn EmbeddingProvider,
        force: bool,
    ) -> TaxonomyResult<EmbeddingIndex> {
        let model = provider.model_name();
        if taxonomy.is_empty() {
            return Ok(EmbeddingIndex {
                taxonomy_fingerprint: taxonomy.fingerprint().to_string(),
                model: model.to_string(),
                dimensions: 0,
                records: Vec::new(),
            });
        }

        let reason = if force {
            RebuildReason::Forced
        } else {
            match self.store.load() {
                Ok(Some(doc)) => match validate(&doc, taxonomy, model) {
                    Ok(()) => {
                        info!(
                            records = doc.records.len(),
                            model,
                            "Using cached taxonomy embeddings"
                        );
                        return Ok(EmbeddingIndex::from_document(doc));
                    }
                    Err(reason) => reason,
                },
                Ok(None) => RebuildReason::Missing,
                Err(e) => RebuildReason::Corrupt(e.to_string()),
            }
        };

        info!(%reason, categories = taxonomy.len(), model, "Rebuilding taxonomy embeddings");
        let index = self.build(taxonomy, provider).await?;

        if let Err(e) = self.store.save(&index.to_document(Utc::now())) {
            warn!(error = %e, location = %self.store.location(), "Failed to persist embedding index");
        }
        Ok(index)
    }

    async fn build(
        &self,
        taxonomy: &ExternalTaxonomy,
        provider: &dyn EmbeddingProvider,
    ) -> TaxonomyResult<EmbeddingIndex> {
        // Same order the fingerprint uses, so rebuilds are reproducible
        let mut categories: Vec<&ExternalCategory> = taxonomy.categories().iter().collect();
        categories.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.id.cmp(&b.id)));

        let mut records = Vec::with_capacity(categories.len());
        for (n, chunk) in categories.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = chunk.iter().map(|c| c.full_name.clone()).collect();
            let vectors = provider.embed_batch(&texts).await?;
            if vectors.len() != chunk.len() {
                return Err(TaxonomyError::IncompleteEmbeddings(format!(
                    "batch {n}: {} vectors for {} categories",
                    vectors.len(),
                    chunk.len()
                )));
            }
            debug!(batch = n, size = chunk.len(), "Embedded taxonomy batch");

            records.extend(chunk.iter().zip(vectors).map(|(category, vector)| EmbeddingRecord {
                id: category.id.clone(),
                full_name: category.full_name.clone(),
                vector,
            }));
        }

        let dimensions = records.first().map(|r| r.vector.len()).unwrap_or(0);
        if dimensions == 0 || records.iter().any(|r| r.vector.len() != dimensions) {
            return Err(TaxonomyError::IncompleteEmbeddings(
                "inconsistent vector dimensions".to_string(),
            ));
        }

        Ok(EmbeddingIndex {
            taxonomy_fingerprint: taxonomy.fingerprint().to_string(),
            model: provider.model_name().to_string(),
            dimensions,
            records,
        })
    }
}
