//! Organizational topology: Enterprise → Plant → Line → Station.
//!
//! Every node carries the same header (`NodeInfo`), an explicit parent
//! reference (except the Enterprise root) and a denormalized list of child
//! ids. Parents are assigned once at creation; moving a node goes through
//! the kernel's `reparent`, never through a patch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::entity::{
    validate_code, validate_non_empty, validate_window, AuditStamp, Entity, EntityKind,
};
use super::scope::{EntityId, EntityStatus, Scope};
use crate::error::KernelError;

/// Header fields shared by all topology nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Stable identifier.
    pub id: EntityId,
    /// Short human mnemonic.
    pub code: String,
    /// Display name.
    pub display_name: String,
    /// Lifecycle status.
    pub status: EntityStatus,
    /// Start of the validity window.
    pub effective_from: DateTime<Utc>,
    /// End of the validity window (open-ended when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_to: Option<DateTime<Utc>>,
    /// Creation and approval attribution.
    pub stamp: AuditStamp,
}

impl NodeInfo {
    /// Create an active header effective from now.
    pub fn new(
        id: impl Into<EntityId>,
        code: impl Into<String>,
        display_name: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            display_name: display_name.into(),
            status: EntityStatus::Active,
            effective_from: Utc::now(),
            effective_to: None,
            stamp: AuditStamp::created_now(created_by),
        }
    }

    fn validate(&self) -> Result<(), KernelError> {
        validate_non_empty("id", self.id.as_str())?;
        validate_code("code", &self.code)?;
        validate_non_empty("display_name", &self.display_name)?;
        validate_window(&self.effective_from, &self.effective_to)
    }

    fn apply(&mut self, patch: NodePatch) {
        if let Some(code) = patch.code {
            self.code = code;
        }
        if let Some(display_name) = patch.display_name {
            self.display_name = display_name;
        }
        if let Some(from) = patch.effective_from {
            self.effective_from = from;
        }
        if let Some(to) = patch.effective_to {
            self.effective_to = to;
        }
    }
}

/// Shallow-merge update for any topology node.
///
/// Status and parent are deliberately absent; they change through
/// `set_status` and `reparent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    /// New code.
    #[serde(default)]
    pub code: Option<String>,
    /// New display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// New start of validity.
    #[serde(default)]
    pub effective_from: Option<DateTime<Utc>>,
    /// New end of validity (`Some(None)` clears it).
    ///
    /// In JSON an absent field leaves the window alone and `null` clears it.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub effective_to: Option<Option<DateTime<Utc>>>,
}

/// Map a present field to `Some`, keeping `null` as `Some(None)`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl NodePatch {
    /// Patch that only renames the node.
    pub fn display_name(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Accessors the kernel needs to treat the four node kinds uniformly.
pub trait TopologyNode: Entity<Patch = NodePatch> {
    /// Level this node kind lives at.
    const SCOPE: Scope;

    /// Shared header.
    fn info(&self) -> &NodeInfo;

    /// Mutable shared header.
    fn info_mut(&mut self) -> &mut NodeInfo;

    /// Parent id (`None` for the Enterprise root).
    fn parent_id(&self) -> Option<&EntityId>;

    /// Point this node at a new parent. No-op for the root.
    fn set_parent_id(&mut self, parent: EntityId);

    /// Denormalized child ids.
    fn child_ids(&self) -> &[EntityId];

    /// Mutable child ids (`None` for leaf Stations).
    fn child_ids_mut(&mut self) -> Option<&mut Vec<EntityId>>;

    /// Current status.
    fn status(&self) -> EntityStatus {
        self.info().status
    }
}

/// Enterprise: the single root level of the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enterprise {
    /// Shared header.
    #[serde(flatten)]
    pub info: NodeInfo,
    /// Child plant ids.
    #[serde(default)]
    pub plant_ids: Vec<EntityId>,
}

impl Enterprise {
    /// Create a new enterprise.
    pub fn new(info: NodeInfo) -> Self {
        Self { info, plant_ids: Vec::new() }
    }
}

/// Plant, owned by an Enterprise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    /// Shared header.
    #[serde(flatten)]
    pub info: NodeInfo,
    /// Parent enterprise.
    pub enterprise_id: EntityId,
    /// Child line ids.
    #[serde(default)]
    pub line_ids: Vec<EntityId>,
}

impl Plant {
    /// Create a new plant under `enterprise_id`.
    pub fn new(info: NodeInfo, enterprise_id: impl Into<EntityId>) -> Self {
        Self { info, enterprise_id: enterprise_id.into(), line_ids: Vec::new() }
    }
}

/// Production line, owned by a Plant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Shared header.
    #[serde(flatten)]
    pub info: NodeInfo,
    /// Parent plant.
    pub plant_id: EntityId,
    /// Child station ids.
    #[serde(default)]
    pub station_ids: Vec<EntityId>,
}

impl Line {
    /// Create a new line under `plant_id`.
    pub fn new(info: NodeInfo, plant_id: impl Into<EntityId>) -> Self {
        Self { info, plant_id: plant_id.into(), station_ids: Vec::new() }
    }
}

/// Station, the leaf level, owned by a Line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Shared header.
    #[serde(flatten)]
    pub info: NodeInfo,
    /// Parent line.
    pub line_id: EntityId,
}

impl Station {
    /// Create a new station under `line_id`.
    pub fn new(info: NodeInfo, line_id: impl Into<EntityId>) -> Self {
        Self { info, line_id: line_id.into() }
    }
}

macro_rules! impl_topology_node {
    ($ty:ty, $kind:ident, parent: $parent_scope:ident . $parent:ident, children: $children:ident) => {
        impl Entity for $ty {
            type Patch = NodePatch;
            const KIND: EntityKind = EntityKind::$kind;

            fn id(&self) -> &EntityId {
                &self.info.id
            }

            fn apply_patch(&mut self, patch: NodePatch) {
                self.info.apply(patch);
            }

            fn validate(&self) -> Result<(), KernelError> {
                self.info.validate()
            }

            fn parent_ref(&self) -> Option<(Scope, &EntityId)> {
                Some((Scope::$parent_scope, &self.$parent))
            }

            fn clear_links(&mut self) {
                self.$children.clear();
            }
        }

        impl TopologyNode for $ty {
            const SCOPE: Scope = Scope::$kind;

            fn info(&self) -> &NodeInfo {
                &self.info
            }

            fn info_mut(&mut self) -> &mut NodeInfo {
                &mut self.info
            }

            fn parent_id(&self) -> Option<&EntityId> {
                Some(&self.$parent)
            }

            fn set_parent_id(&mut self, parent: EntityId) {
                self.$parent = parent;
            }

            fn child_ids(&self) -> &[EntityId] {
                &self.$children
            }

            fn child_ids_mut(&mut self) -> Option<&mut Vec<EntityId>> {
                Some(&mut self.$children)
            }
        }
    };
}

impl_topology_node!(Plant, Plant, parent: Enterprise.enterprise_id, children: line_ids);
impl_topology_node!(Line, Line, parent: Plant.plant_id, children: station_ids);

impl Entity for Station {
    type Patch = NodePatch;
    const KIND: EntityKind = EntityKind::Station;

    fn id(&self) -> &EntityId {
        &self.info.id
    }

    fn apply_patch(&mut self, patch: NodePatch) {
        self.info.apply(patch);
    }

    fn validate(&self) -> Result<(), KernelError> {
        self.info.validate()
    }

    fn parent_ref(&self) -> Option<(Scope, &EntityId)> {
        Some((Scope::Line, &self.line_id))
    }
}

impl TopologyNode for Station {
    const SCOPE: Scope = Scope::Station;

    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn parent_id(&self) -> Option<&EntityId> {
        Some(&self.line_id)
    }

    fn set_parent_id(&mut self, parent: EntityId) {
        self.line_id = parent;
    }

    fn child_ids(&self) -> &[EntityId] {
        &[]
    }

    fn child_ids_mut(&mut self) -> Option<&mut Vec<EntityId>> {
        None
    }
}

impl Entity for Enterprise {
    type Patch = NodePatch;
    const KIND: EntityKind = EntityKind::Enterprise;

    fn id(&self) -> &EntityId {
        &self.info.id
    }

    fn apply_patch(&mut self, patch: NodePatch) {
        self.info.apply(patch);
    }

    fn validate(&self) -> Result<(), KernelError> {
        self.info.validate()
    }

    fn clear_links(&mut self) {
        self.plant_ids.clear();
    }
}

impl TopologyNode for Enterprise {
    const SCOPE: Scope = Scope::Enterprise;

    fn info(&self) -> &NodeInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    fn parent_id(&self) -> Option<&EntityId> {
        None
    }

    fn set_parent_id(&mut self, _parent: EntityId) {}

    fn child_ids(&self) -> &[EntityId] {
        &self.plant_ids
    }

    fn child_ids_mut(&mut self) -> Option<&mut Vec<EntityId>> {
        Some(&mut self.plant_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str) -> NodeInfo {
        NodeInfo::new(id, id, format!("Node {}", id), "tester")
    }

    #[test]
    fn test_patch_is_shallow_merge() {
        let mut line = Line::new(info("LINE-A"), "FAC-WB-01");
        let before_code = line.info.code.clone();

        line.apply_patch(NodePatch::display_name("Assembly A"));

        assert_eq!(line.info.display_name, "Assembly A");
        assert_eq!(line.info.code, before_code);
        assert_eq!(line.plant_id, EntityId::new("FAC-WB-01"));
    }

    #[test]
    fn test_patch_can_clear_effective_to() {
        let mut station = Station::new(info("STN-A4"), "LINE-A");
        station.info.effective_to = Some(Utc::now());

        station.apply_patch(NodePatch { effective_to: Some(None), ..NodePatch::default() });

        assert!(station.info.effective_to.is_none());
    }

    #[test]
    fn test_patch_json_null_clears_effective_to() {
        let clear: NodePatch = serde_json::from_str(r#"{"effective_to": null}"#).unwrap();
        assert_eq!(clear.effective_to, Some(None));

        let untouched: NodePatch = serde_json::from_str(r#"{"display_name": "A"}"#).unwrap();
        assert_eq!(untouched.effective_to, None);

        let set: NodePatch =
            serde_json::from_str(r#"{"effective_to": "2030-01-01T00:00:00Z"}"#).unwrap();
        assert!(matches!(set.effective_to, Some(Some(_))));
    }

    #[test]
    fn test_parent_refs() {
        let plant = Plant::new(info("FAC-WB-01"), "ENT-01");
        assert_eq!(plant.parent_ref(), Some((Scope::Enterprise, &EntityId::new("ENT-01"))));

        let ent = Enterprise::new(info("ENT-01"));
        assert!(ent.parent_ref().is_none());
        assert!(ent.parent_id().is_none());
    }

    #[test]
    fn test_station_has_no_children() {
        let mut station = Station::new(info("STN-A4"), "LINE-A");
        assert!(station.child_ids().is_empty());
        assert!(station.child_ids_mut().is_none());
    }

    #[test]
    fn test_flattened_serialization() {
        let plant = Plant::new(info("FAC-WB-01"), "ENT-01");
        let value = serde_json::to_value(&plant).unwrap();
        assert_eq!(value["id"], "FAC-WB-01");
        assert_eq!(value["enterprise_id"], "ENT-01");
        assert_eq!(value["status"], "ACTIVE");

        let back: Plant = serde_json::from_value(value).unwrap();
        assert_eq!(back, plant);
    }

    #[test]
    fn test_validation_rejects_bad_code() {
        let mut node = info("FAC-1");
        node.code = "fac 1".to_string();
        let plant = Plant::new(node, "ENT-01");
        assert_eq!(plant.validate().unwrap_err().code(), "INVALID_FIELD");
    }
}
