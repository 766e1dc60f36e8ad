//! In-memory snapshot store for testing and embedding.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{SnapshotStore, StoreSnapshot};

/// Error type for in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MemoryStoreError {
    /// Failure switched on with [`InMemorySnapshotStore::fail_saves`].
    #[error("Injected save failure")]
    InjectedFailure,
}

/// Snapshot store that keeps the last saved snapshot in memory.
///
/// Clones share the same slot, so a test can keep a handle after moving the
/// store into a kernel and inspect or tamper with what was saved.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    slot: Arc<Mutex<Option<StoreSnapshot>>>,
    rejected: Arc<Mutex<Vec<StoreSnapshot>>>,
    fail_saves: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl InMemorySnapshotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `snapshot`.
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::default();
        *store.slot.lock() = Some(snapshot);
        store
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Copy of the last saved snapshot.
    pub fn snapshot(&self) -> Option<StoreSnapshot> {
        self.slot.lock().clone()
    }

    /// Snapshots moved aside by [`SnapshotStore::quarantine`], oldest first.
    pub fn rejected(&self) -> Vec<StoreSnapshot> {
        self.rejected.lock().clone()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    type Error = MemoryStoreError;

    fn load(&self) -> Result<Option<StoreSnapshot>, Self::Error> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, snapshot: &StoreSnapshot) -> Result<(), Self::Error> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(MemoryStoreError::InjectedFailure);
        }
        *self.slot.lock() = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn quarantine(&self) -> Result<Option<String>, Self::Error> {
        let Some(snapshot) = self.slot.lock().take() else {
            return Ok(None);
        };
        let mut rejected = self.rejected.lock();
        rejected.push(snapshot);
        Ok(Some(format!("memory:rejected[{}]", rejected.len() - 1)))
    }
}
