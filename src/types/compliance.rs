//! Regulatory reference catalogs and per-node compliance bindings.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{validate_code, validate_non_empty, Entity, EntityKind};
use super::scope::{EntityId, EntityStatus, Scope};
use crate::error::KernelError;

/// A regulation a node may be bound to (e.g. FSMA 204, EU GMP Annex 11).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatoryFramework {
    /// Stable identifier.
    pub id: EntityId,
    /// Short code.
    pub code: String,
    /// Full name.
    pub name: String,
    /// Issuing jurisdiction (`US`, `EU`, ...).
    pub jurisdiction: String,
    /// Whether the framework applies unconditionally where bound.
    pub mandatory: bool,
    /// Catalog status.
    pub status: EntityStatus,
}

/// A standard operating procedure profile a node may be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SopProfile {
    /// Stable identifier.
    pub id: EntityId,
    /// Short code.
    pub code: String,
    /// Full name.
    pub name: String,
    /// Jurisdiction the SOP was written for.
    pub jurisdiction: String,
    /// Whether the SOP must be followed where bound.
    pub mandatory: bool,
    /// Catalog status.
    pub status: EntityStatus,
}

/// Shallow-merge update for both reference catalogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePatch {
    /// New code.
    #[serde(default)]
    pub code: Option<String>,
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New jurisdiction.
    #[serde(default)]
    pub jurisdiction: Option<String>,
    /// New mandatory flag.
    #[serde(default)]
    pub mandatory: Option<bool>,
    /// New status.
    #[serde(default)]
    pub status: Option<EntityStatus>,
}

macro_rules! impl_reference_entity {
    ($ty:ident, $kind:ident) => {
        impl $ty {
            /// Create an active catalog entry.
            pub fn new(
                id: impl Into<EntityId>,
                code: impl Into<String>,
                name: impl Into<String>,
                jurisdiction: impl Into<String>,
                mandatory: bool,
            ) -> Self {
                Self {
                    id: id.into(),
                    code: code.into(),
                    name: name.into(),
                    jurisdiction: jurisdiction.into(),
                    mandatory,
                    status: EntityStatus::Active,
                }
            }
        }

        impl Entity for $ty {
            type Patch = ReferencePatch;
            const KIND: EntityKind = EntityKind::$kind;

            fn id(&self) -> &EntityId {
                &self.id
            }

            fn apply_patch(&mut self, patch: ReferencePatch) {
                if let Some(code) = patch.code {
                    self.code = code;
                }
                if let Some(name) = patch.name {
                    self.name = name;
                }
                if let Some(jurisdiction) = patch.jurisdiction {
                    self.jurisdiction = jurisdiction;
                }
                if let Some(mandatory) = patch.mandatory {
                    self.mandatory = mandatory;
                }
                if let Some(status) = patch.status {
                    self.status = status;
                }
            }

            fn validate(&self) -> Result<(), KernelError> {
                validate_non_empty("id", self.id.as_str())?;
                validate_code("code", &self.code)?;
                validate_non_empty("name", &self.name)
            }
        }
    };
}

impl_reference_entity!(RegulatoryFramework, RegulatoryFramework);
impl_reference_entity!(SopProfile, SopProfile);

/// Key of a compliance binding: one binding per node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BindingKey {
    /// Node level.
    pub scope: Scope,
    /// Node id.
    pub scope_id: EntityId,
}

impl BindingKey {
    /// Create a binding key.
    pub fn new(scope: Scope, scope_id: impl Into<EntityId>) -> Self {
        Self { scope, scope_id: scope_id.into() }
    }
}

/// Frameworks and SOP profiles attached to one topology node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceBinding {
    /// Node level.
    pub scope: Scope,
    /// Node id.
    pub scope_id: EntityId,
    /// Bound framework ids.
    #[serde(default)]
    pub regulatory_framework_ids: BTreeSet<EntityId>,
    /// Bound SOP profile ids.
    #[serde(default)]
    pub sop_profile_ids: BTreeSet<EntityId>,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
    /// Last writer.
    pub updated_by: String,
}

impl ComplianceBinding {
    /// Key of this binding.
    pub fn key(&self) -> BindingKey {
        BindingKey::new(self.scope, self.scope_id.clone())
    }
}

/// Compliance visible at one node after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveCompliance {
    /// Resolved frameworks, ordered by id.
    pub frameworks: Vec<RegulatoryFramework>,
    /// Resolved SOP profiles, ordered by id.
    pub sop_profiles: Vec<SopProfile>,
    /// Level of the binding that decided the result (`Global` when none).
    pub source_scope: Scope,
    /// Node of the binding that decided the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<EntityId>,
}

impl EffectiveCompliance {
    /// Result for a node with no binding anywhere in its chain.
    pub fn unbound() -> Self {
        Self {
            frameworks: Vec::new(),
            sop_profiles: Vec::new(),
            source_scope: Scope::Global,
            source_id: None,
        }
    }

    /// Whether any mandatory framework or SOP applies.
    pub fn has_mandatory(&self) -> bool {
        self.frameworks.iter().any(|f| f.mandatory) || self.sop_profiles.iter().any(|s| s.mandatory)
    }
}
