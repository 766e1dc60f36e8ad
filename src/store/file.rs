//! JSON file snapshot store.
//!
//! ## Configuration
//!
//! The path comes from `KernelConfig::snapshot_path`
//! (`FACTORY_SNAPSHOT_PATH`, default `./data/factory-kernel.json`).
//!
//! Writes go to a uniquely named sibling temp file which is then renamed
//! over the target, so a crash mid-write leaves the previous snapshot intact.
//!
//! A quarantined snapshot is renamed to `<file>.rejected-<UTC timestamp>`
//! in the same directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use super::{SnapshotStore, StoreSnapshot};

/// Error type for the file store.
#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// File exists but is not a valid snapshot document.
    #[error("Malformed snapshot {path}: {source}")]
    Decode {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// Snapshot could not be encoded.
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Snapshot store backed by one pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store at `path`. Nothing is touched until the first load or save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> FileStoreError {
        FileStoreError::Io { path: self.path.clone(), source }
    }
}

impl SnapshotStore for JsonFileStore {
    type Error = FileStoreError;

    fn load(&self) -> Result<Option<StoreSnapshot>, Self::Error> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| FileStoreError::Decode { path: self.path.clone(), source })
    }

    fn save(&self, snapshot: &StoreSnapshot) -> Result<(), Self::Error> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension(format!("{}.tmp", Uuid::new_v4()));

        fs::write(&tmp, &bytes).map_err(|e| self.io_error(e))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.io_error(e));
        }

        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "snapshot written");
        Ok(())
    }

    fn quarantine(&self) -> Result<Option<String>, Self::Error> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        let target = self.path.with_file_name(format!(
            "{}.rejected-{}",
            name,
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        ));

        match fs::rename(&self.path, &target) {
            Ok(()) => Ok(Some(target.display().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
