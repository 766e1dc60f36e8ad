//! The factory kernel: the only write path into master data.
//!
//! Every successful mutation appends exactly one audit entry and then saves
//! a full snapshot through the configured [`SnapshotStore`]. What happens
//! when that save fails is decided by [`PersistencePolicy`]:
//!
//! - `BestEffort`: the failure is logged and kept in
//!   [`FactoryKernel::last_persist_error`]; the mutation reports success.
//! - `Strict`: the mutation returns `PERSISTENCE_FAILURE`. The in-memory
//!   change is not rolled back.
//!
//! Reads never touch the store.

use serde::Serialize;
use serde_json::{json, Value as JsonValue};

use crate::config::{KernelConfig, PersistencePolicy};
use crate::error::{KernelError, KernelResult};
use crate::resolver::{
    resolve_effective_compliance, resolve_effective_flag, resolve_effective_flags,
};
use crate::seed;
use crate::state::{HasRepository, KernelState};
use crate::store::{SnapshotStore, StoreSnapshot};
use crate::types::{
    AuditAction, AuditLog, AuditStamp, BindingKey, CapabilityFlag, CapabilityOverride,
    ComplianceBinding, EffectiveCompliance, EffectiveFlag, Entity, EntityId, EntityKind,
    EntityStatus, FlagPatch, Line, OverrideKey, Plant, Scope, Station, TopologyNode,
};

/// What `open` found in the store.
enum Boot {
    Loaded,
    Fresh,
    Rejected,
}

/// Master-data kernel over a snapshot store.
///
/// ## Example
///
/// ```
/// use factory_capability_kernel::{FactoryKernel, InMemorySnapshotStore, KernelConfig, Scope};
///
/// let mut kernel = FactoryKernel::open(KernelConfig::default(), InMemorySnapshotStore::new())?;
/// kernel.upsert_override(&"STRICT_GATING".into(), Scope::Plant, &"FAC-WB-01".into(), false, "qa.lead")?;
///
/// let eff = kernel.effective_flag(&"STRICT_GATING".into(), Scope::Station, &"STN-A4".into())?;
/// assert!(!eff.effective_value);
/// assert_eq!(eff.source_scope, Scope::Plant);
/// # Ok::<(), factory_capability_kernel::KernelError>(())
/// ```
#[derive(Debug)]
pub struct FactoryKernel<S: SnapshotStore> {
    state: KernelState,
    store: S,
    config: KernelConfig,
    last_persist_error: Option<String>,
}

impl<S: SnapshotStore> FactoryKernel<S> {
    /// Load state from `store`, falling back to the seed dataset.
    ///
    /// A missing, unreadable, corrupt or incompatible snapshot never fails
    /// startup on its own: it is logged and replaced by the seed. A rejected
    /// snapshot is first quarantined through [`SnapshotStore::quarantine`];
    /// only then is the seed saved according to the persistence policy. If
    /// the quarantine fails the seed is not saved at boot, and `Strict`
    /// returns `PERSISTENCE_FAILURE`.
    pub fn open(config: KernelConfig, store: S) -> KernelResult<Self> {
        let (state, boot) = match store.load() {
            Ok(Some(snapshot)) => match snapshot.verify() {
                Ok(()) => {
                    tracing::info!(
                        saved_at = %snapshot.saved_at,
                        checksum = %snapshot.checksum,
                        overrides = snapshot.state.num_overrides(),
                        "snapshot loaded"
                    );
                    (snapshot.state, Boot::Loaded)
                }
                Err(defect) => {
                    tracing::warn!(error = %defect, "snapshot rejected, reseeding");
                    (seed::seed_state(), Boot::Rejected)
                }
            },
            Ok(None) => {
                tracing::info!("no snapshot found, seeding");
                (seed::seed_state(), Boot::Fresh)
            }
            Err(e) => {
                tracing::warn!(error = %e, "snapshot unreadable, reseeding");
                (seed::seed_state(), Boot::Rejected)
            }
        };

        let mut kernel = Self::with_state(config, store, state);
        match boot {
            Boot::Loaded => {}
            Boot::Fresh => kernel.persist_after_mutation()?,
            Boot::Rejected => match kernel.store.quarantine() {
                Ok(moved) => {
                    if let Some(location) = moved {
                        tracing::warn!(location = %location, "rejected snapshot kept aside");
                    }
                    kernel.persist_after_mutation()?;
                }
                Err(e) => {
                    let err = KernelError::from_store(e);
                    kernel.last_persist_error = Some(err.to_string());
                    tracing::warn!(error = %err, "could not quarantine rejected snapshot, seed not saved");
                    if kernel.config.persistence_policy == PersistencePolicy::Strict {
                        return Err(err);
                    }
                }
            },
        }
        Ok(kernel)
    }

    /// Wrap an existing state without loading or saving anything.
    pub fn with_state(config: KernelConfig, store: S, mut state: KernelState) -> Self {
        state.audit.set_capacity(config.audit_capacity);
        Self {
            state,
            store,
            config,
            last_persist_error: None,
        }
    }

    /// Current state (read-only).
    pub fn state(&self) -> &KernelState {
        &self.state
    }

    /// Active configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Audit trail.
    pub fn audit_log(&self) -> &AuditLog {
        self.state.audit_log()
    }

    /// Message of the last failed save, cleared by the next successful one.
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────

    /// Effective value and provenance of one flag at one node.
    pub fn effective_flag(
        &self,
        flag_id: &EntityId,
        scope: Scope,
        scope_id: &EntityId,
    ) -> KernelResult<EffectiveFlag> {
        resolve_effective_flag(&self.state, flag_id, scope, scope_id)
    }

    /// Every registered flag resolved at one node, ordered by flag id.
    pub fn effective_flags(&self, scope: Scope, scope_id: &EntityId) -> KernelResult<Vec<EffectiveFlag>> {
        resolve_effective_flags(&self.state, scope, scope_id)
    }

    /// Boolean view used by workflow gates.
    pub fn is_enabled(&self, flag_id: &EntityId, scope: Scope, scope_id: &EntityId) -> KernelResult<bool> {
        self.effective_flag(flag_id, scope, scope_id)
            .map(|eff| eff.effective_value)
    }

    /// Frameworks and SOP profiles in force at one node.
    pub fn effective_compliance(&self, scope: Scope, scope_id: &EntityId) -> KernelResult<EffectiveCompliance> {
        resolve_effective_compliance(&self.state, scope, scope_id, self.config.compliance_mode)
    }

    /// All override rows ordered by `(flag_id, scope, scope_id)`.
    pub fn overrides(&self) -> impl Iterator<Item = &CapabilityOverride> {
        self.state.overrides()
    }

    /// Override rows for one flag, least specific scope first.
    pub fn overrides_for_flag(&self, flag_id: &EntityId) -> KernelResult<Vec<&CapabilityOverride>> {
        if self.state.flag(flag_id).is_none() {
            return Err(KernelError::UnknownFlag(flag_id.clone()));
        }
        Ok(self
            .state
            .overrides()
            .filter(|row| &row.flag_id == flag_id)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Generic records
    // ─────────────────────────────────────────────────────────────────────

    /// All records of kind `T` in insertion order.
    pub fn list<T>(&self) -> &[T]
    where
        T: Entity,
        KernelState: HasRepository<T>,
    {
        self.state.repository::<T>().list()
    }

    /// One record of kind `T`, or `NOT_FOUND`.
    pub fn get<T>(&self, id: &EntityId) -> KernelResult<&T>
    where
        T: Entity,
        KernelState: HasRepository<T>,
    {
        self.state.repository::<T>().require(id)
    }

    /// Create a record.
    ///
    /// Fields are validated, a parent reference must name an existing
    /// non-retired node at the parent scope (`INVALID_PARENT`), and the id
    /// must be free (`DUPLICATE_ID`). Child lists on the incoming record are
    /// ignored; the new id is appended to its parent's list.
    pub fn add<T>(&mut self, mut entity: T, actor: &str) -> KernelResult<T>
    where
        T: Entity,
        KernelState: HasRepository<T>,
    {
        entity.validate()?;
        entity.clear_links();

        let parent = entity.parent_ref().map(|(scope, id)| (scope, id.clone()));
        if let Some((parent_scope, parent_id)) = &parent {
            self.check_parent(T::KIND, entity.id(), *parent_scope, parent_id)?;
        }

        let id = entity.id().clone();
        <KernelState as HasRepository<T>>::repo_mut(&mut self.state).insert(entity.clone())?;
        if let Some((parent_scope, parent_id)) = &parent {
            self.state.attach_child(*parent_scope, parent_id, &id);
        }

        self.commit(actor, AuditAction::Create, T::KIND, id.to_string(), None, to_json(&entity))?;
        Ok(entity)
    }

    /// Shallow-merge `patch` into the record `id`. Returns the merged record.
    pub fn update<T>(&mut self, id: &EntityId, patch: T::Patch, actor: &str) -> KernelResult<T>
    where
        T: Entity,
        KernelState: HasRepository<T>,
    {
        let (before, after) = <KernelState as HasRepository<T>>::repo_mut(&mut self.state).update(id, patch)?;
        self.commit(
            actor,
            AuditAction::Update,
            T::KIND,
            id.to_string(),
            to_json(&before),
            to_json(&after),
        )?;
        Ok(after)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Capability flags
    // ─────────────────────────────────────────────────────────────────────

    /// Register a new flag definition.
    pub fn register_flag(&mut self, flag: CapabilityFlag, actor: &str) -> KernelResult<CapabilityFlag> {
        self.add(flag, actor)
    }

    /// Change a flag's global default.
    pub fn set_flag_default(
        &mut self,
        flag_id: &EntityId,
        value: bool,
        actor: &str,
    ) -> KernelResult<CapabilityFlag> {
        if self.state.flag(flag_id).is_none() {
            return Err(KernelError::UnknownFlag(flag_id.clone()));
        }
        let patch = FlagPatch {
            default_value: Some(value),
            ..FlagPatch::default()
        };
        self.update::<CapabilityFlag>(flag_id, patch, actor)
    }

    /// Insert or replace the override at `(flag_id, scope, scope_id)`.
    pub fn upsert_override(
        &mut self,
        flag_id: &EntityId,
        scope: Scope,
        scope_id: &EntityId,
        value: bool,
        actor: &str,
    ) -> KernelResult<CapabilityOverride> {
        if self.state.flag(flag_id).is_none() {
            return Err(KernelError::UnknownFlag(flag_id.clone()));
        }
        if scope == Scope::Global {
            return Err(KernelError::InvalidScope {
                scope,
                reason: "global values are flag defaults, use set_flag_default",
            });
        }
        if !self.state.node_exists(scope, scope_id) {
            return Err(KernelError::unknown_node(scope, scope_id));
        }

        let row = CapabilityOverride {
            flag_id: flag_id.clone(),
            scope,
            scope_id: scope_id.clone(),
            value,
            updated_at: chrono::Utc::now(),
            updated_by: actor.to_string(),
        };
        let key = row.key();
        let before = self.state.overrides.insert(key.clone(), row.clone());

        self.commit(
            actor,
            AuditAction::Upsert,
            EntityKind::CapabilityOverride,
            key.to_string(),
            before.as_ref().and_then(to_json),
            to_json(&row),
        )?;
        Ok(row)
    }

    /// Delete the override at `(flag_id, scope, scope_id)`.
    ///
    /// Returns the removed row. Removing a row that does not exist is a
    /// no-op: no audit entry, no save.
    pub fn remove_override(
        &mut self,
        flag_id: &EntityId,
        scope: Scope,
        scope_id: &EntityId,
        actor: &str,
    ) -> KernelResult<Option<CapabilityOverride>> {
        let key = OverrideKey::new(flag_id.clone(), scope, scope_id.clone());
        let Some(removed) = self.state.overrides.remove(&key) else {
            tracing::debug!(key = %key, "no override to remove");
            return Ok(None);
        };

        self.commit(
            actor,
            AuditAction::Remove,
            EntityKind::CapabilityOverride,
            key.to_string(),
            to_json(&removed),
            None,
        )?;
        Ok(Some(removed))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Compliance bindings
    // ─────────────────────────────────────────────────────────────────────

    /// Replace the binding attached to one node.
    ///
    /// Every framework and SOP id must exist (`NOT_FOUND`).
    pub fn bind_compliance(
        &mut self,
        scope: Scope,
        scope_id: &EntityId,
        framework_ids: impl IntoIterator<Item = EntityId>,
        sop_profile_ids: impl IntoIterator<Item = EntityId>,
        actor: &str,
    ) -> KernelResult<ComplianceBinding> {
        if scope == Scope::Global {
            return Err(KernelError::InvalidScope {
                scope,
                reason: "bindings attach to topology nodes",
            });
        }
        if !self.state.node_exists(scope, scope_id) {
            return Err(KernelError::unknown_node(scope, scope_id));
        }

        let regulatory_framework_ids = framework_ids.into_iter().collect::<std::collections::BTreeSet<_>>();
        let sop_profile_ids = sop_profile_ids.into_iter().collect::<std::collections::BTreeSet<_>>();
        for id in &regulatory_framework_ids {
            self.state.frameworks().require(id)?;
        }
        for id in &sop_profile_ids {
            self.state.sop_profiles().require(id)?;
        }

        let binding = ComplianceBinding {
            scope,
            scope_id: scope_id.clone(),
            regulatory_framework_ids,
            sop_profile_ids,
            updated_at: chrono::Utc::now(),
            updated_by: actor.to_string(),
        };
        let key = binding.key();
        let before = self.state.bindings.insert(key.clone(), binding.clone());

        self.commit(
            actor,
            AuditAction::Upsert,
            EntityKind::ComplianceBinding,
            binding_label(&key),
            before.as_ref().and_then(to_json),
            to_json(&binding),
        )?;
        Ok(binding)
    }

    /// Delete the binding attached to one node. Absent binding is a no-op.
    pub fn remove_binding(
        &mut self,
        scope: Scope,
        scope_id: &EntityId,
        actor: &str,
    ) -> KernelResult<Option<ComplianceBinding>> {
        let key = BindingKey::new(scope, scope_id.clone());
        let Some(removed) = self.state.bindings.remove(&key) else {
            return Ok(None);
        };

        self.commit(
            actor,
            AuditAction::Remove,
            EntityKind::ComplianceBinding,
            binding_label(&key),
            to_json(&removed),
            None,
        )?;
        Ok(Some(removed))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Topology lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Move a plant, line or station under a different parent.
    ///
    /// The new parent must exist one level up and not be retired. Moving a
    /// node under its current parent is a no-op.
    pub fn reparent(
        &mut self,
        scope: Scope,
        node_id: &EntityId,
        new_parent_id: &EntityId,
        actor: &str,
    ) -> KernelResult<()> {
        let kind = match scope {
            Scope::Plant => EntityKind::Plant,
            Scope::Line => EntityKind::Line,
            Scope::Station => EntityKind::Station,
            Scope::Global | Scope::Enterprise => {
                return Err(KernelError::InvalidScope {
                    scope,
                    reason: "only plants, lines and stations have a parent",
                })
            }
        };

        let (parent_scope, old_parent) = self
            .state
            .parent_of(scope, node_id)
            .map(|(s, id)| (s, id.clone()))
            .ok_or_else(|| KernelError::not_found(kind, node_id))?;
        if &old_parent == new_parent_id {
            return Ok(());
        }
        self.check_parent(kind, node_id, parent_scope, new_parent_id)?;

        match scope {
            Scope::Plant => repoint::<Plant>(&mut self.state, node_id, new_parent_id),
            Scope::Line => repoint::<Line>(&mut self.state, node_id, new_parent_id),
            _ => repoint::<Station>(&mut self.state, node_id, new_parent_id),
        }
        self.state.detach_child(parent_scope, &old_parent, node_id);
        self.state.attach_child(parent_scope, new_parent_id, node_id);

        self.commit(
            actor,
            AuditAction::Reparent,
            kind,
            node_id.to_string(),
            Some(json!({ "parent_scope": parent_scope, "parent_id": old_parent })),
            Some(json!({ "parent_scope": parent_scope, "parent_id": new_parent_id })),
        )?;
        Ok(())
    }

    /// Change a node's lifecycle status. Returns the previous status.
    ///
    /// `RETIRED` is terminal. Setting the current status again is a no-op.
    pub fn set_status(
        &mut self,
        scope: Scope,
        node_id: &EntityId,
        status: EntityStatus,
        actor: &str,
    ) -> KernelResult<EntityStatus> {
        let kind = node_kind(scope)?;
        let info = self
            .state
            .node_info_mut(scope, node_id)
            .ok_or_else(|| KernelError::not_found(kind, node_id))?;

        let from = info.status;
        if !from.can_transition_to(status) {
            return Err(KernelError::InvalidStatusTransition {
                id: node_id.clone(),
                from,
                to: status,
            });
        }
        if from == status {
            return Ok(from);
        }
        info.status = status;

        self.commit(
            actor,
            AuditAction::StatusChange,
            kind,
            node_id.to_string(),
            Some(json!({ "status": from })),
            Some(json!({ "status": status })),
        )?;
        Ok(from)
    }

    /// Stamp a node as approved by `actor`.
    pub fn approve(&mut self, scope: Scope, node_id: &EntityId, actor: &str) -> KernelResult<AuditStamp> {
        let kind = node_kind(scope)?;
        let info = self
            .state
            .node_info_mut(scope, node_id)
            .ok_or_else(|| KernelError::not_found(kind, node_id))?;

        let before = info.stamp.clone();
        info.stamp.approve(actor);
        let after = info.stamp.clone();

        self.commit(
            actor,
            AuditAction::Approve,
            kind,
            node_id.to_string(),
            to_json(&before),
            to_json(&after),
        )?;
        Ok(after)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────

    /// Save a snapshot now. Always strict: failures are returned.
    pub fn persist(&mut self) -> KernelResult<()> {
        let snapshot = StoreSnapshot::capture(&self.state);
        match self.store.save(&snapshot) {
            Ok(()) => {
                tracing::debug!(checksum = %snapshot.checksum, "snapshot saved");
                self.last_persist_error = None;
                Ok(())
            }
            Err(e) => {
                let err = KernelError::from_store(e);
                self.last_persist_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn persist_after_mutation(&mut self) -> KernelResult<()> {
        match self.persist() {
            Ok(()) => Ok(()),
            Err(e) => match self.config.persistence_policy {
                PersistencePolicy::BestEffort => {
                    tracing::warn!(error = %e, "snapshot save failed, continuing in memory");
                    Ok(())
                }
                PersistencePolicy::Strict => {
                    tracing::warn!(error = %e, "snapshot save failed");
                    Err(e)
                }
            },
        }
    }

    /// Record one audit entry, then save.
    fn commit(
        &mut self,
        actor: &str,
        action: AuditAction,
        kind: EntityKind,
        entity_id: String,
        before: Option<JsonValue>,
        after: Option<JsonValue>,
    ) -> KernelResult<u64> {
        let seq = self
            .state
            .audit
            .record(actor, action, kind, entity_id.clone(), before, after);
        tracing::info!(
            seq,
            actor,
            action = ?action,
            entity_kind = %kind,
            entity_id = %entity_id,
            "mutation applied"
        );
        self.persist_after_mutation()?;
        Ok(seq)
    }

    fn check_parent(
        &self,
        kind: EntityKind,
        id: &EntityId,
        parent_scope: Scope,
        parent_id: &EntityId,
    ) -> KernelResult<()> {
        let reason = match self.state.node_status(parent_scope, parent_id) {
            None => "does not exist",
            Some(status) if status.is_retired() => "is retired",
            Some(_) => return Ok(()),
        };
        Err(KernelError::InvalidParent {
            kind,
            id: id.clone(),
            parent_scope,
            parent_id: parent_id.clone(),
            reason,
        })
    }
}

fn node_kind(scope: Scope) -> KernelResult<EntityKind> {
    match scope {
        Scope::Enterprise => Ok(EntityKind::Enterprise),
        Scope::Plant => Ok(EntityKind::Plant),
        Scope::Line => Ok(EntityKind::Line),
        Scope::Station => Ok(EntityKind::Station),
        Scope::Global => Err(KernelError::InvalidScope {
            scope,
            reason: "GLOBAL is not a topology node",
        }),
    }
}

fn repoint<T>(state: &mut KernelState, id: &EntityId, parent: &EntityId)
where
    T: TopologyNode,
    KernelState: HasRepository<T>,
{
    if let Some(node) = <KernelState as HasRepository<T>>::repo_mut(state).get_mut(id) {
        node.set_parent_id(parent.clone());
    }
}

fn binding_label(key: &BindingKey) -> String {
    format!("{}:{}", key.scope, key.scope_id)
}

fn to_json<T: Serialize>(value: &T) -> Option<JsonValue> {
    serde_json::to_value(value).ok()
}
