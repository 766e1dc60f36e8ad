//! # factory-capability-kernel
//!
//! Hierarchical capability flags and compliance bindings for factory
//! master data.
//!
//! The kernel answers one question:
//!
//! > Given a flag and a node in the plant topology, what value is in force
//! > there, and which level decided it?
//!
//! ## Core Contract
//!
//! 1. Topology is a strict hierarchy: Enterprise → Plant → Line → Station
//! 2. A flag has a global default and optional overrides at any node
//! 3. The closest override (self, then ancestors) wins; otherwise the default
//! 4. Every result carries its provenance (`source_scope`, `source_id`)
//!
//! ## Architecture
//!
//! ```text
//! caller → FactoryKernel ──mutations──→ KernelState ──snapshot──→ SnapshotStore
//!               │                            ↑                    (file or memory)
//!               └──queries──→ resolver ──────┘
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same state + same query → identical result
//! - Flag lists are ordered by flag id, override tables by composite key
//! - The seed dataset has a fixed fingerprint

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod repository;
pub mod state;
pub mod resolver;
pub mod store;
pub mod config;
pub mod seed;
pub mod kernel;
pub mod shared;
pub mod canonical;

// Re-exports
pub use types::{
    AuditAction, AuditEntry, AuditLog, AuditStamp, BindingKey, CapabilityFlag, CapabilityOverride,
    ComplianceBinding, DeviceClass, DeviceClassPatch, EffectiveCompliance, EffectiveFlag,
    Enterprise, Entity, EntityId, EntityKind, EntityStatus, FlagPatch, Line, NodeInfo, NodePatch,
    OverrideKey, Plant, ReferencePatch, RegulatoryFramework, Scope, SopProfile, Station,
    TopologyNode, User, UserPatch, DEFAULT_AUDIT_CAPACITY,
};
pub use error::{KernelError, KernelResult};
pub use repository::Repository;
pub use state::{HasRepository, KernelState};
pub use resolver::{
    resolve_effective_compliance, resolve_effective_flag, resolve_effective_flags, ChainLink,
    ComplianceMode, ScopeChain,
};
pub use store::{
    FileStoreError, InMemorySnapshotStore, JsonFileStore, MemoryStoreError, SnapshotDefect,
    SnapshotStore, StoreSnapshot, SCHEMA_VERSION,
};
pub use config::{KernelConfig, PersistencePolicy};
pub use kernel::FactoryKernel;
pub use shared::SharedKernel;
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
