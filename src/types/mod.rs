//! Core types for the capability kernel.

pub mod scope;
pub mod entity;
pub mod topology;
pub mod capability;
pub mod compliance;
pub mod catalog;
pub mod audit;

pub use scope::{EntityId, EntityStatus, Scope};
pub use entity::{AuditStamp, Entity, EntityKind};
pub use topology::{Enterprise, Line, NodeInfo, NodePatch, Plant, Station, TopologyNode};
pub use capability::{CapabilityFlag, CapabilityOverride, EffectiveFlag, FlagPatch, OverrideKey};
pub use compliance::{
    BindingKey, ComplianceBinding, EffectiveCompliance, ReferencePatch, RegulatoryFramework,
    SopProfile,
};
pub use catalog::{DeviceClass, DeviceClassPatch, User, UserPatch};
pub use audit::{AuditAction, AuditEntry, AuditLog, DEFAULT_AUDIT_CAPACITY};
