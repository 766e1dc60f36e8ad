//! Capability flags, scoped overrides and the derived effective value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{validate_machine_name, validate_non_empty, Entity, EntityKind};
use super::scope::{EntityId, Scope};
use crate::error::KernelError;

/// Global, scope-independent definition of a boolean capability.
///
/// `default_value` is the GLOBAL-level effective value when no override
/// exists anywhere in a node's chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlag {
    /// Unique machine name (`STRICT_GATING`).
    pub id: EntityId,
    /// Short human label.
    pub label: String,
    /// What turning the flag on changes.
    #[serde(default)]
    pub description: String,
    /// Grouping used by admin screens (`QUALITY`, `LOGISTICS`, ...).
    #[serde(default)]
    pub category: String,
    /// Value at GLOBAL scope.
    pub default_value: bool,
}

impl CapabilityFlag {
    /// Create a flag definition.
    pub fn new(
        id: impl Into<EntityId>,
        label: impl Into<String>,
        category: impl Into<String>,
        default_value: bool,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            category: category.into(),
            default_value,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Shallow-merge update for a flag definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagPatch {
    /// New label.
    #[serde(default)]
    pub label: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New category.
    #[serde(default)]
    pub category: Option<String>,
    /// New global default.
    #[serde(default)]
    pub default_value: Option<bool>,
}

impl Entity for CapabilityFlag {
    type Patch = FlagPatch;
    const KIND: EntityKind = EntityKind::CapabilityFlag;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn apply_patch(&mut self, patch: FlagPatch) {
        if let Some(label) = patch.label {
            self.label = label;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(default_value) = patch.default_value {
            self.default_value = default_value;
        }
    }

    fn validate(&self) -> Result<(), KernelError> {
        validate_machine_name("id", self.id.as_str())?;
        validate_non_empty("label", &self.label)
    }
}

/// Composite key of an override row: at most one live row per key.
///
/// Ordered `(flag_id, scope, scope_id)` so an override table iterates
/// grouped by flag and then from least to most specific scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OverrideKey {
    /// Flag being overridden.
    pub flag_id: EntityId,
    /// Node level. Never `Global`.
    pub scope: Scope,
    /// Node id.
    pub scope_id: EntityId,
}

impl OverrideKey {
    /// Create an override key.
    pub fn new(flag_id: impl Into<EntityId>, scope: Scope, scope_id: impl Into<EntityId>) -> Self {
        Self {
            flag_id: flag_id.into(),
            scope,
            scope_id: scope_id.into(),
        }
    }
}

impl std::fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.flag_id, self.scope, self.scope_id)
    }
}

/// An explicit flag value set at one topology node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOverride {
    /// Flag being overridden.
    pub flag_id: EntityId,
    /// Node level.
    pub scope: Scope,
    /// Node id.
    pub scope_id: EntityId,
    /// Overriding value.
    pub value: bool,
    /// Last write time.
    pub updated_at: DateTime<Utc>,
    /// Last writer.
    pub updated_by: String,
}

impl CapabilityOverride {
    /// Composite key of this row.
    pub fn key(&self) -> OverrideKey {
        OverrideKey::new(self.flag_id.clone(), self.scope, self.scope_id.clone())
    }
}

/// Effective value of a flag as observed at one node (derived, never stored).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveFlag {
    /// Flag definition.
    #[serde(flatten)]
    pub flag: CapabilityFlag,
    /// Value the node observes.
    pub effective_value: bool,
    /// Level the value came from (`Global` for the default).
    pub source_scope: Scope,
    /// Node the value came from (`None` for the default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<EntityId>,
    /// True only when the queried node itself holds the override.
    pub is_overridden: bool,
}

impl EffectiveFlag {
    /// Whether the value was inherited from an ancestor override.
    pub fn is_inherited(&self) -> bool {
        !self.is_overridden && self.source_scope != Scope::Global
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_key_ordering_groups_by_flag() {
        let a = OverrideKey::new("A_FLAG", Scope::Station, "S1");
        let b = OverrideKey::new("B_FLAG", Scope::Enterprise, "E1");
        let a_plant = OverrideKey::new("A_FLAG", Scope::Plant, "P1");

        let mut keys = vec![b.clone(), a.clone(), a_plant.clone()];
        keys.sort();
        assert_eq!(keys, vec![a_plant, a, b]);
    }

    #[test]
    fn test_flag_patch_sets_default() {
        let mut flag = CapabilityFlag::new("STRICT_GATING", "Strict gating", "QUALITY", true);
        flag.apply_patch(FlagPatch { default_value: Some(false), ..FlagPatch::default() });
        assert!(!flag.default_value);
        assert_eq!(flag.label, "Strict gating");
    }

    #[test]
    fn test_flag_validation() {
        assert!(CapabilityFlag::new("STRICT_GATING", "Strict", "QUALITY", true).validate().is_ok());
        assert!(CapabilityFlag::new("strict", "Strict", "QUALITY", true).validate().is_err());
        assert!(CapabilityFlag::new("STRICT", " ", "QUALITY", true).validate().is_err());
    }

    #[test]
    fn test_effective_flag_inherited() {
        let flag = CapabilityFlag::new("STRICT_GATING", "Strict", "QUALITY", true);
        let eff = EffectiveFlag {
            flag,
            effective_value: false,
            source_scope: Scope::Plant,
            source_id: Some("FAC-WB-01".into()),
            is_overridden: false,
        };
        assert!(eff.is_inherited());

        let json = serde_json::to_value(&eff).unwrap();
        assert_eq!(json["id"], "STRICT_GATING");
        assert_eq!(json["source_scope"], "PLANT");
    }
}
