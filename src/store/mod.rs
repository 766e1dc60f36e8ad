//! Snapshot storage backends.
//!
//! The kernel persists its whole state as one [`StoreSnapshot`] after every
//! successful mutation. Backends only move snapshots in and out; validation
//! of what comes back is the kernel's job (see [`StoreSnapshot::verify`]).
//! A rejected snapshot is quarantined by the backend, never overwritten.

pub mod file;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::KernelState;

/// Version of the persisted layout. Bumped on incompatible changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Trait for snapshot storage backends.
///
/// Calls are synchronous and run to completion; the kernel holds no lock
/// across them other than its own.
pub trait SnapshotStore: Send {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the last saved snapshot, `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<StoreSnapshot>, Self::Error>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &StoreSnapshot) -> Result<(), Self::Error>;

    /// Move the stored snapshot out of the way without deleting it.
    ///
    /// Called when a loaded snapshot is rejected, before the seed is saved
    /// over it. Returns where the old contents went, `None` if there was
    /// nothing to move.
    fn quarantine(&self) -> Result<Option<String>, Self::Error>;
}

/// Persisted envelope around the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Layout version the snapshot was written with.
    pub schema_version: u32,
    /// Write time.
    pub saved_at: DateTime<Utc>,
    /// Canonical hash of `state` at write time.
    pub checksum: String,
    /// The state itself.
    pub state: KernelState,
}

/// Why a loaded snapshot was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotDefect {
    /// Written by an incompatible layout version.
    #[error("schema version {found} is not supported (expected {expected})")]
    SchemaMismatch {
        /// Version found in the snapshot.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// State does not hash to the stored checksum.
    #[error("checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        /// Checksum in the envelope.
        stored: String,
        /// Checksum of the loaded state.
        computed: String,
    },

    /// State is internally inconsistent.
    #[error("integrity violation: {0}")]
    Integrity(String),
}

impl StoreSnapshot {
    /// Capture the current state.
    pub fn capture(state: &KernelState) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            checksum: state.fingerprint(),
            state: state.clone(),
        }
    }

    /// Check version, checksum and referential integrity.
    pub fn verify(&self) -> Result<(), SnapshotDefect> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(SnapshotDefect::SchemaMismatch {
                found: self.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let computed = self.state.fingerprint();
        if computed != self.checksum {
            return Err(SnapshotDefect::ChecksumMismatch {
                stored: self.checksum.clone(),
                computed,
            });
        }

        if let Some(issue) = self.state.integrity_issues().into_iter().next() {
            return Err(SnapshotDefect::Integrity(issue));
        }

        Ok(())
    }
}

pub use file::{FileStoreError, JsonFileStore};
pub use memory::{InMemorySnapshotStore, MemoryStoreError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    #[test]
    fn test_fresh_capture_verifies() {
        let snapshot = StoreSnapshot::capture(&seed::seed_state());
        assert_eq!(snapshot.verify(), Ok(()));
    }

    #[test]
    fn test_tampered_state_fails_checksum() {
        let mut snapshot = StoreSnapshot::capture(&seed::seed_state());
        snapshot.state.audit.set_capacity(3);
        assert!(matches!(snapshot.verify(), Err(SnapshotDefect::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_future_schema_rejected() {
        let mut snapshot = StoreSnapshot::capture(&seed::seed_state());
        snapshot.schema_version = SCHEMA_VERSION + 1;
        assert!(matches!(snapshot.verify(), Err(SnapshotDefect::SchemaMismatch { .. })));
    }
}
