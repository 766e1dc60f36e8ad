//! Kernel configuration.
//!
//! ## Environment
//!
//! - `FACTORY_SNAPSHOT_PATH`: snapshot file (default: `./data/factory-kernel.json`)
//! - `FACTORY_AUDIT_CAPACITY`: audit entries retained (default: 500)
//! - `FACTORY_PERSISTENCE`: `best_effort` or `strict` (default: `best_effort`)
//! - `FACTORY_COMPLIANCE_MODE`: `closest_wins` or `union` (default: `closest_wins`)
//!
//! Absent or unparseable values fall back to the default.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::resolver::ComplianceMode;
use crate::types::DEFAULT_AUDIT_CAPACITY;

/// Default snapshot location.
pub const DEFAULT_SNAPSHOT_PATH: &str = "./data/factory-kernel.json";

/// What a mutation does when its snapshot cannot be saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Log, remember the error, and report the mutation as successful.
    #[default]
    BestEffort,
    /// Return `PERSISTENCE_FAILURE` to the caller.
    Strict,
}

impl PersistencePolicy {
    /// Parse `best_effort` / `strict` (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "best_effort" | "best-effort" => Some(Self::BestEffort),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

impl fmt::Display for PersistencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BestEffort => write!(f, "best_effort"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Runtime settings for a [`FactoryKernel`](crate::kernel::FactoryKernel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Snapshot file used by [`JsonFileStore`](crate::store::JsonFileStore).
    pub snapshot_path: PathBuf,
    /// Audit entries retained (minimum 1).
    pub audit_capacity: usize,
    /// Behaviour on snapshot save failure.
    pub persistence_policy: PersistencePolicy,
    /// How compliance bindings combine along the chain.
    pub compliance_mode: ComplianceMode,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            persistence_policy: PersistencePolicy::default(),
            compliance_mode: ComplianceMode::default(),
        }
    }
}

impl KernelConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            snapshot_path: lookup("FACTORY_SNAPSHOT_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_path),
            audit_capacity: lookup("FACTORY_AUDIT_CAPACITY")
                .and_then(|s| s.trim().parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.audit_capacity),
            persistence_policy: lookup("FACTORY_PERSISTENCE")
                .and_then(|s| PersistencePolicy::from_str(s.trim()))
                .unwrap_or(defaults.persistence_policy),
            compliance_mode: lookup("FACTORY_COMPLIANCE_MODE")
                .and_then(|s| ComplianceMode::from_str(s.trim()))
                .unwrap_or(defaults.compliance_mode),
        }
    }

    /// Builder: set the snapshot path.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    /// Builder: set the audit capacity.
    pub fn with_audit_capacity(mut self, capacity: usize) -> Self {
        self.audit_capacity = capacity.max(1);
        self
    }

    /// Builder: set the persistence policy.
    pub fn with_persistence_policy(mut self, policy: PersistencePolicy) -> Self {
        self.persistence_policy = policy;
        self
    }

    /// Builder: set the compliance mode.
    pub fn with_compliance_mode(mut self, mode: ComplianceMode) -> Self {
        self.compliance_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = KernelConfig::from_lookup(|_| None);
        assert_eq!(config, KernelConfig::default());
        assert_eq!(config.audit_capacity, 500);
        assert_eq!(config.persistence_policy, PersistencePolicy::BestEffort);
        assert_eq!(config.compliance_mode, ComplianceMode::ClosestWins);
    }

    #[test]
    fn test_values_read() {
        let config = KernelConfig::from_lookup(lookup_from(&[
            ("FACTORY_SNAPSHOT_PATH", "/var/lib/fk/state.json"),
            ("FACTORY_AUDIT_CAPACITY", "42"),
            ("FACTORY_PERSISTENCE", "STRICT"),
            ("FACTORY_COMPLIANCE_MODE", "union"),
        ]));
        assert_eq!(config.snapshot_path, PathBuf::from("/var/lib/fk/state.json"));
        assert_eq!(config.audit_capacity, 42);
        assert_eq!(config.persistence_policy, PersistencePolicy::Strict);
        assert_eq!(config.compliance_mode, ComplianceMode::Union);
    }

    #[test]
    fn test_garbage_falls_back() {
        let config = KernelConfig::from_lookup(lookup_from(&[
            ("FACTORY_AUDIT_CAPACITY", "0"),
            ("FACTORY_PERSISTENCE", "sometimes"),
            ("FACTORY_COMPLIANCE_MODE", ""),
        ]));
        assert_eq!(config, KernelConfig::default());
    }
}
