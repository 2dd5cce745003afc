//! In-memory document store for tests and dry runs

use super::{DocumentStore, StoreError, StoreResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Holds one document in memory and counts saves.
///
/// Clones share the same document, so a test can keep a handle while the
/// engine owns another.
#[derive(Debug, Clone)]
pub struct MemoryStore<D> {
    document: Arc<Mutex<Option<D>>>,
    saves: Arc<AtomicUsize>,
    corrupt: bool,
}

impl<D> Default for MemoryStore<D> {
    fn default() -> Self {
        Self {
            document: Arc::new(Mutex::new(None)),
            saves: Arc::new(AtomicUsize::new(0)),
            corrupt: false,
        }
    }
}

impl<D: Clone> MemoryStore<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a document
    pub fn with_document(document: D) -> Self {
        let store = Self::default();
        *store.guard() = Some(document);
        store
    }

    /// Store whose loads always fail as corrupt
    pub fn corrupted() -> Self {
        Self {
            corrupt: true,
            ..Self::default()
        }
    }

    /// Copy of the current document
    pub fn snapshot(&self) -> Option<D> {
        self.guard().clone()
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn guard(&self) -> MutexGuard<'_, Option<D>> {
        self.document.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<D> DocumentStore<D> for MemoryStore<D>
where
    D: Clone + Send,
{
    fn load(&self) -> StoreResult<Option<D>> {
        if self.corrupt {
            return Err(StoreError::Corrupt {
                location: self.location(),
                reason: "simulated corruption".to_string(),
            });
        }
        Ok(self.guard().clone())
    }

    fn save(&self, document: &D) -> StoreResult<()> {
        *self.guard() = Some(document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
