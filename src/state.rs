//! The complete in-memory master-data state.
//!
//! `KernelState` is what a snapshot persists: one array per entity kind, the
//! override rows, the binding rows and the audit log. It exposes read-only
//! lookups; all writes go through [`crate::kernel::FactoryKernel`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::repository::Repository;
use crate::types::{
    AuditLog, BindingKey, CapabilityFlag, CapabilityOverride, ComplianceBinding, DeviceClass,
    Enterprise, Entity, EntityId, EntityStatus, Line, NodeInfo, OverrideKey, Plant,
    RegulatoryFramework, Scope, SopProfile, Station, TopologyNode, User,
};

/// A stored row with a composite key (override or binding).
pub trait Row {
    /// Composite key type.
    type Key: Ord + Clone;

    /// Key of this row.
    fn row_key(&self) -> Self::Key;
}

impl Row for CapabilityOverride {
    type Key = OverrideKey;

    fn row_key(&self) -> OverrideKey {
        self.key()
    }
}

impl Row for ComplianceBinding {
    type Key = BindingKey;

    fn row_key(&self) -> BindingKey {
        self.key()
    }
}

/// Serialize a keyed row table as a plain list of rows.
mod rows {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Row;

    pub fn serialize<S, K, V>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<V::Key, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Row + Deserialize<'de>,
    {
        let rows = Vec::<V>::deserialize(deserializer)?;
        Ok(rows.into_iter().map(|row| (row.row_key(), row)).collect())
    }
}

/// Access to the repository holding entity kind `T`.
pub trait HasRepository<T: Entity> {
    /// Shared access.
    fn repo(&self) -> &Repository<T>;

    /// Exclusive access.
    fn repo_mut(&mut self) -> &mut Repository<T>;
}

/// Whole master-data state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelState {
    #[serde(default)]
    pub(crate) enterprises: Repository<Enterprise>,
    #[serde(default)]
    pub(crate) plants: Repository<Plant>,
    #[serde(default)]
    pub(crate) lines: Repository<Line>,
    #[serde(default)]
    pub(crate) stations: Repository<Station>,
    #[serde(default)]
    pub(crate) device_classes: Repository<DeviceClass>,
    #[serde(default)]
    pub(crate) users: Repository<User>,
    #[serde(default)]
    pub(crate) frameworks: Repository<RegulatoryFramework>,
    #[serde(default)]
    pub(crate) sop_profiles: Repository<SopProfile>,
    #[serde(default)]
    pub(crate) flags: Repository<CapabilityFlag>,
    #[serde(default, with = "rows")]
    pub(crate) overrides: BTreeMap<OverrideKey, CapabilityOverride>,
    #[serde(default, with = "rows")]
    pub(crate) bindings: BTreeMap<BindingKey, ComplianceBinding>,
    #[serde(default)]
    pub(crate) audit: AuditLog,
}

macro_rules! has_repository {
    ($ty:ty, $field:ident) => {
        impl HasRepository<$ty> for KernelState {
            fn repo(&self) -> &Repository<$ty> {
                &self.$field
            }

            fn repo_mut(&mut self) -> &mut Repository<$ty> {
                &mut self.$field
            }
        }
    };
}

has_repository!(Enterprise, enterprises);
has_repository!(Plant, plants);
has_repository!(Line, lines);
has_repository!(Station, stations);
has_repository!(DeviceClass, device_classes);
has_repository!(User, users);
has_repository!(RegulatoryFramework, frameworks);
has_repository!(SopProfile, sop_profiles);
has_repository!(CapabilityFlag, flags);

impl KernelState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository for entity kind `T`.
    pub fn repository<T: Entity>(&self) -> &Repository<T>
    where
        Self: HasRepository<T>,
    {
        self.repo()
    }

    /// Enterprises in insertion order.
    pub fn enterprises(&self) -> &[Enterprise] {
        self.enterprises.list()
    }

    /// Plants in insertion order.
    pub fn plants(&self) -> &[Plant] {
        self.plants.list()
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[Line] {
        self.lines.list()
    }

    /// Stations in insertion order.
    pub fn stations(&self) -> &[Station] {
        self.stations.list()
    }

    /// Registered flags in registration order.
    pub fn flags(&self) -> &[CapabilityFlag] {
        self.flags.list()
    }

    /// Look up a flag definition.
    pub fn flag(&self, id: &EntityId) -> Option<&CapabilityFlag> {
        self.flags.get(id)
    }

    /// Regulatory framework catalog.
    pub fn frameworks(&self) -> &Repository<RegulatoryFramework> {
        &self.frameworks
    }

    /// SOP profile catalog.
    pub fn sop_profiles(&self) -> &Repository<SopProfile> {
        &self.sop_profiles
    }

    /// All override rows ordered by `(flag_id, scope, scope_id)`.
    pub fn overrides(&self) -> impl Iterator<Item = &CapabilityOverride> {
        self.overrides.values()
    }

    /// Override row at exactly this key.
    pub fn override_at(&self, key: &OverrideKey) -> Option<&CapabilityOverride> {
        self.overrides.get(key)
    }

    /// All compliance bindings ordered by `(scope, scope_id)`.
    pub fn bindings(&self) -> impl Iterator<Item = &ComplianceBinding> {
        self.bindings.values()
    }

    /// Binding attached to exactly this node.
    pub fn binding_at(&self, key: &BindingKey) -> Option<&ComplianceBinding> {
        self.bindings.get(key)
    }

    /// Audit trail.
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Header of the node `id` at `scope`, or `None` (always `None` for Global).
    pub fn node_info(&self, scope: Scope, id: &EntityId) -> Option<&NodeInfo> {
        match scope {
            Scope::Global => None,
            Scope::Enterprise => self.enterprises.get(id).map(|n| &n.info),
            Scope::Plant => self.plants.get(id).map(|n| &n.info),
            Scope::Line => self.lines.get(id).map(|n| &n.info),
            Scope::Station => self.stations.get(id).map(|n| &n.info),
        }
    }

    /// Whether `id` names a node at `scope`.
    pub fn node_exists(&self, scope: Scope, id: &EntityId) -> bool {
        self.node_info(scope, id).is_some()
    }

    /// Status of the node `id` at `scope`.
    pub fn node_status(&self, scope: Scope, id: &EntityId) -> Option<EntityStatus> {
        self.node_info(scope, id).map(|info| info.status)
    }

    /// Parent of the node `id` at `scope`: `(parent_scope, parent_id)`.
    ///
    /// `None` for enterprises, for Global and for unknown nodes.
    pub fn parent_of(&self, scope: Scope, id: &EntityId) -> Option<(Scope, &EntityId)> {
        match scope {
            Scope::Global | Scope::Enterprise => None,
            Scope::Plant => self.plants.get(id).map(|p| (Scope::Enterprise, &p.enterprise_id)),
            Scope::Line => self.lines.get(id).map(|l| (Scope::Plant, &l.plant_id)),
            Scope::Station => self.stations.get(id).map(|s| (Scope::Line, &s.line_id)),
        }
    }

    /// Child ids of the node `id` at `scope`.
    pub fn children_of(&self, scope: Scope, id: &EntityId) -> &[EntityId] {
        match scope {
            Scope::Global | Scope::Station => &[],
            Scope::Enterprise => self.enterprises.get(id).map(|e| e.child_ids()).unwrap_or(&[]),
            Scope::Plant => self.plants.get(id).map(|p| p.child_ids()).unwrap_or(&[]),
            Scope::Line => self.lines.get(id).map(|l| l.child_ids()).unwrap_or(&[]),
        }
    }

    pub(crate) fn node_info_mut(&mut self, scope: Scope, id: &EntityId) -> Option<&mut NodeInfo> {
        match scope {
            Scope::Global => None,
            Scope::Enterprise => self.enterprises.get_mut(id).map(|n| n.info_mut()),
            Scope::Plant => self.plants.get_mut(id).map(|n| n.info_mut()),
            Scope::Line => self.lines.get_mut(id).map(|n| n.info_mut()),
            Scope::Station => self.stations.get_mut(id).map(|n| n.info_mut()),
        }
    }

    fn child_list_mut(&mut self, scope: Scope, id: &EntityId) -> Option<&mut Vec<EntityId>> {
        match scope {
            Scope::Global | Scope::Station => None,
            Scope::Enterprise => self.enterprises.get_mut(id).and_then(|n| n.child_ids_mut()),
            Scope::Plant => self.plants.get_mut(id).and_then(|n| n.child_ids_mut()),
            Scope::Line => self.lines.get_mut(id).and_then(|n| n.child_ids_mut()),
        }
    }

    /// Append `child` to the child list of `parent` (no duplicates).
    pub(crate) fn attach_child(&mut self, parent_scope: Scope, parent: &EntityId, child: &EntityId) {
        if let Some(list) = self.child_list_mut(parent_scope, parent) {
            if !list.contains(child) {
                list.push(child.clone());
            }
        }
    }

    /// Remove `child` from the child list of `parent`.
    pub(crate) fn detach_child(&mut self, parent_scope: Scope, parent: &EntityId, child: &EntityId) {
        if let Some(list) = self.child_list_mut(parent_scope, parent) {
            list.retain(|c| c != child);
        }
    }

    /// Number of override rows.
    pub fn num_overrides(&self) -> usize {
        self.overrides.len()
    }

    /// Canonical fingerprint of the whole state (used as snapshot checksum).
    pub fn fingerprint(&self) -> String {
        canonical_hash_hex(self)
    }

    /// Referential problems in the topology: dangling parents, child lists
    /// that disagree with parent pointers in either direction, and overrides
    /// on unknown flags.
    ///
    /// Empty for any state built through the kernel. Used to vet snapshots
    /// loaded from disk.
    pub fn integrity_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for scope in [Scope::Plant, Scope::Line, Scope::Station] {
            for id in self.ids_at(scope) {
                let Some((parent_scope, parent_id)) = self.parent_of(scope, &id) else {
                    continue;
                };
                if !self.node_exists(parent_scope, parent_id) {
                    issues.push(format!(
                        "{} {} references missing {} {}",
                        scope, id, parent_scope, parent_id
                    ));
                } else if !self.children_of(parent_scope, parent_id).contains(&id) {
                    issues.push(format!(
                        "{} {} missing from child list of {} {}",
                        scope, id, parent_scope, parent_id
                    ));
                }
            }
        }

        for scope in [Scope::Enterprise, Scope::Plant, Scope::Line] {
            let child_scope = match scope {
                Scope::Enterprise => Scope::Plant,
                Scope::Plant => Scope::Line,
                _ => Scope::Station,
            };
            for id in self.ids_at(scope) {
                let children = self.children_of(scope, &id);
                for (pos, child) in children.iter().enumerate() {
                    if children[..pos].contains(child) {
                        issues.push(format!("{} {} lists {} {} twice", scope, id, child_scope, child));
                        continue;
                    }
                    match self.parent_of(child_scope, child) {
                        None => issues.push(format!(
                            "{} {} lists missing {} {}",
                            scope, id, child_scope, child
                        )),
                        Some((_, owner)) if owner != &id => issues.push(format!(
                            "{} {} lists {} {} which belongs to {}",
                            scope, id, child_scope, child, owner
                        )),
                        Some(_) => {}
                    }
                }
            }
        }

        for key in self.overrides.keys() {
            if self.flags.get(&key.flag_id).is_none() {
                issues.push(format!("override {} references unknown flag", key));
            }
        }

        issues
    }

    fn ids_at(&self, scope: Scope) -> Vec<EntityId> {
        match scope {
            Scope::Global => Vec::new(),
            Scope::Enterprise => self.enterprises.iter().map(|n| n.info.id.clone()).collect(),
            Scope::Plant => self.plants.iter().map(|n| n.info.id.clone()).collect(),
            Scope::Line => self.lines.iter().map(|n| n.info.id.clone()).collect(),
            Scope::Station => self.stations.iter().map(|n| n.info.id.clone()).collect(),
        }
    }
}
