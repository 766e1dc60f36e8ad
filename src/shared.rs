//! Shared kernel handle for hosts with several callers.
//!
//! One kernel per tenant or deployment, behind one mutual-exclusion lock.
//! Closures run to completion under the lock, so a read-modify-write
//! sequence is never interleaved with another caller's mutation.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::KernelConfig;
use crate::error::KernelResult;
use crate::kernel::FactoryKernel;
use crate::store::SnapshotStore;

/// Cloneable handle to one locked [`FactoryKernel`].
pub struct SharedKernel<S: SnapshotStore> {
    inner: Arc<Mutex<FactoryKernel<S>>>,
}

impl<S: SnapshotStore> SharedKernel<S> {
    /// Wrap an opened kernel.
    pub fn new(kernel: FactoryKernel<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(kernel)),
        }
    }

    /// Open a kernel from `store` and wrap it.
    pub fn open(config: KernelConfig, store: S) -> KernelResult<Self> {
        FactoryKernel::open(config, store).map(Self::new)
    }

    /// Run a read-only closure under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&FactoryKernel<S>) -> R) -> R {
        let guard = self.inner.lock();
        f(&guard)
    }

    /// Run a mutating closure under the lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut FactoryKernel<S>) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Number of live handles.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<S: SnapshotStore> Clone for SharedKernel<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySnapshotStore;
    use crate::types::{EntityId, Scope};
    use std::thread;

    #[test]
    fn test_handles_share_one_kernel() {
        let shared = SharedKernel::open(KernelConfig::default(), InMemorySnapshotStore::new()).unwrap();
        let other = shared.clone();
        assert_eq!(shared.handle_count(), 2);

        other
            .write(|k| k.upsert_override(&"STRICT_GATING".into(), Scope::Line, &"LINE-A".into(), false, "qa"))
            .unwrap();

        let value = shared
            .read(|k| k.is_enabled(&"STRICT_GATING".into(), Scope::Station, &"STN-A4".into()))
            .unwrap();
        assert!(!value);
    }

    #[test]
    fn test_concurrent_writers_all_audited() {
        let shared = SharedKernel::open(KernelConfig::default(), InMemorySnapshotStore::new()).unwrap();
        let stations = ["STN-A1", "STN-A2", "STN-A3", "STN-A4"];

        let handles: Vec<_> = stations
            .iter()
            .map(|id| {
                let shared = shared.clone();
                let id = EntityId::from(*id);
                thread::spawn(move || {
                    shared.write(|k| k.upsert_override(&"AUTO_RELEASE".into(), Scope::Station, &id, true, "worker"))
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        shared.read(|k| {
            assert_eq!(k.state().num_overrides(), 4);
            assert_eq!(k.audit_log().len(), 4);
        });
    }
}
