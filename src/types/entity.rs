//! The `Entity` contract shared by every stored record kind.
//!
//! One generic repository and one generic add/update path serve all
//! record kinds; this trait is the seam that makes that possible. Key
//! extraction, patch merging and parent references are all resolved at
//! compile time per kind.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::scope::{EntityId, Scope};
use crate::error::KernelError;

/// Every kind of record the kernel stores and audits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    /// Topology root.
    Enterprise,
    /// Topology level 2.
    Plant,
    /// Topology level 3.
    Line,
    /// Topology leaf.
    Station,
    /// Device class catalog entry.
    DeviceClass,
    /// Platform user.
    User,
    /// Regulatory framework catalog entry.
    RegulatoryFramework,
    /// SOP profile catalog entry.
    SopProfile,
    /// Capability flag definition.
    CapabilityFlag,
    /// Scoped capability override row.
    CapabilityOverride,
    /// Per-node compliance binding.
    ComplianceBinding,
}

impl EntityKind {
    /// The topology scope this kind lives at, if it is a topology node.
    pub fn scope(&self) -> Option<Scope> {
        match self {
            Self::Enterprise => Some(Scope::Enterprise),
            Self::Plant => Some(Scope::Plant),
            Self::Line => Some(Scope::Line),
            Self::Station => Some(Scope::Station),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enterprise => "ENTERPRISE",
            Self::Plant => "PLANT",
            Self::Line => "LINE",
            Self::Station => "STATION",
            Self::DeviceClass => "DEVICE_CLASS",
            Self::User => "USER",
            Self::RegulatoryFramework => "REGULATORY_FRAMEWORK",
            Self::SopProfile => "SOP_PROFILE",
            Self::CapabilityFlag => "CAPABILITY_FLAG",
            Self::CapabilityOverride => "CAPABILITY_OVERRIDE",
            Self::ComplianceBinding => "COMPLIANCE_BINDING",
        };
        f.write_str(s)
    }
}

/// A stored record with a stable key and a typed shallow-merge patch.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Partial update applied by `update`. Never carries a parent reference.
    type Patch;

    /// Kind tag used for audit entries and error messages.
    const KIND: EntityKind;

    /// Primary key.
    fn id(&self) -> &EntityId;

    /// Shallow-merge a patch into this record.
    fn apply_patch(&mut self, patch: Self::Patch);

    /// Field-level validation run on add and after every patch.
    fn validate(&self) -> Result<(), KernelError> {
        Ok(())
    }

    /// Parent reference that must resolve at creation time.
    fn parent_ref(&self) -> Option<(Scope, &EntityId)> {
        None
    }

    /// Drop denormalized links the kernel maintains itself (child lists).
    fn clear_links(&mut self) {}
}

/// Creation and approval attribution carried by topology records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStamp {
    /// Who created the record.
    pub created_by: String,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// Who approved the record, if approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// When the record was approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl AuditStamp {
    /// Stamp a record created now by `actor`.
    pub fn created_now(actor: impl Into<String>) -> Self {
        Self {
            created_by: actor.into(),
            created_at: Utc::now(),
            approved_by: None,
            approved_at: None,
        }
    }

    /// Mark the record approved by `actor` now.
    pub fn approve(&mut self, actor: impl Into<String>) {
        self.approved_by = Some(actor.into());
        self.approved_at = Some(Utc::now());
    }
}

fn code_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]*$").expect("static regex"))
}

fn machine_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("static regex"))
}

/// Check a short human mnemonic (`"WB-01"`, `"LINE_A"`).
pub fn validate_code(field: &'static str, value: &str) -> Result<(), KernelError> {
    if code_regex().is_match(value) {
        Ok(())
    } else {
        Err(KernelError::InvalidField {
            field,
            reason: format!("'{}' must be uppercase letters, digits, '-' or '_'", value),
        })
    }
}

/// Check a flag machine name (`"STRICT_GATING"`).
pub fn validate_machine_name(field: &'static str, value: &str) -> Result<(), KernelError> {
    if machine_name_regex().is_match(value) {
        Ok(())
    } else {
        Err(KernelError::InvalidField {
            field,
            reason: format!("'{}' must match ^[A-Z][A-Z0-9_]*$", value),
        })
    }
}

/// Reject empty required text fields.
pub fn validate_non_empty(field: &'static str, value: &str) -> Result<(), KernelError> {
    if value.trim().is_empty() {
        Err(KernelError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        })
    } else {
        Ok(())
    }
}

/// Check an `effective_from`/`effective_to` window.
pub fn validate_window(
    from: &DateTime<Utc>,
    to: &Option<DateTime<Utc>>,
) -> Result<(), KernelError> {
    match to {
        Some(to) if to < from => Err(KernelError::InvalidField {
            field: "effective_to",
            reason: "must not precede effective_from".to_string(),
        }),
        _ => Ok(()),
    }
}
