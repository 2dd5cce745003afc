//! Persisted documents
//!
//! Each cache is one self-describing document (format version, fingerprints,
//! timestamps). Stores only move whole documents; deciding whether a loaded
//! document is trustworthy is the owning cache's job.

pub mod error;
pub mod json_file;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// Load/save of a whole persisted document
pub trait DocumentStore<D>: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet
    fn load(&self) -> StoreResult<Option<D>>;

    /// Replace the persisted document. Readers never observe a partial write.
    fn save(&self, document: &D) -> StoreResult<()>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}
