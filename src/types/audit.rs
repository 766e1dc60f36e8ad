//! Append-only audit trail over a bounded recent-history window.
//!
//! Every successful mutation appends exactly one [`AuditEntry`]. The log keeps
//! the newest `capacity` entries; older ones fall off the front. Sequence
//! numbers keep increasing across evictions so a consumer can tell how much
//! history it missed.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::entity::EntityKind;

/// Default number of retained audit entries.
pub const DEFAULT_AUDIT_CAPACITY: usize = 500;

/// What a mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Record created.
    Create,
    /// Record fields merged.
    Update,
    /// Record (override or binding) removed.
    Remove,
    /// Override or binding created or replaced.
    Upsert,
    /// Lifecycle status changed.
    StatusChange,
    /// Node moved under a different parent.
    Reparent,
    /// Node approved.
    Approve,
}

/// One attributed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence number.
    pub seq: u64,
    /// Who made the change.
    pub actor: String,
    /// What kind of change.
    pub action: AuditAction,
    /// Kind of record touched.
    pub entity_kind: EntityKind,
    /// Key of the record touched (composite keys rendered as text).
    pub entity_id: String,
    /// When the change was applied.
    pub timestamp: DateTime<Utc>,
    /// Record before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<JsonValue>,
    /// Record after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<JsonValue>,
}

/// Bounded ring buffer of audit entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<AuditEntry>,
}

impl AuditLog {
    /// Create an empty log retaining at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            next_seq: 1,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an entry, evicting the oldest one if full. Returns the sequence number.
    pub fn record(
        &mut self,
        actor: &str,
        action: AuditAction,
        entity_kind: EntityKind,
        entity_id: impl Into<String>,
        before: Option<JsonValue>,
        after: Option<JsonValue>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(AuditEntry {
            seq,
            actor: actor.to_string(),
            action,
            entity_kind,
            entity_id: entity_id.into(),
            timestamp: Utc::now(),
            before,
            after,
        });
        seq
    }

    /// Change the retention window, dropping the oldest entries if needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Retention window.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence number of the most recent entry.
    pub fn last_seq(&self) -> Option<u64> {
        self.entries.back().map(|e| e.seq)
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    /// Up to `n` most recent entries, newest first.
    pub fn recent(&self, n: usize) -> Vec<&AuditEntry> {
        self.entries.iter().rev().take(n).collect()
    }

    /// Retained entries touching one record, oldest first.
    pub fn for_entity(&self, kind: EntityKind, entity_id: &str) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.entity_kind == kind && e.entity_id == entity_id)
            .collect()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(log: &mut AuditLog, id: &str) -> u64 {
        log.record("tester", AuditAction::Create, EntityKind::Plant, id, None, None)
    }

    #[test]
    fn test_ring_buffer_keeps_newest() {
        let mut log = AuditLog::with_capacity(3);
        for i in 0..5 {
            push(&mut log, &format!("P{}", i));
        }

        assert_eq!(log.len(), 3);
        let ids: Vec<_> = log.entries().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["P2", "P3", "P4"]);
        assert_eq!(log.last_seq(), Some(5));
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut log = AuditLog::with_capacity(10);
        push(&mut log, "A");
        push(&mut log, "B");
        push(&mut log, "C");

        let recent: Vec<_> = log.recent(2).iter().map(|e| e.entity_id.clone()).collect();
        assert_eq!(recent, vec!["C", "B"]);
    }

    #[test]
    fn test_shrinking_capacity_drops_oldest() {
        let mut log = AuditLog::with_capacity(10);
        for i in 0..6 {
            push(&mut log, &format!("P{}", i));
        }
        log.set_capacity(2);

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries().next().unwrap().entity_id, "P4");
    }

    #[test]
    fn test_for_entity_filters_by_kind_and_id() {
        let mut log = AuditLog::with_capacity(10);
        push(&mut log, "P1");
        log.record("tester", AuditAction::Update, EntityKind::Line, "P1", None, None);
        push(&mut log, "P2");

        assert_eq!(log.for_entity(EntityKind::Plant, "P1").len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut log = AuditLog::with_capacity(0);
        push(&mut log, "A");
        push(&mut log, "B");
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
    }
}
