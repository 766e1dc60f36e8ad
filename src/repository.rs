//! Generic in-memory repository for any [`Entity`] kind.
//!
//! Records keep insertion order (lists are returned as stored) and an
//! id → position index gives O(1) lookups. Serializes as a plain array so a
//! snapshot holds one array per entity kind.

use std::collections::HashMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{KernelError, KernelResult};
use crate::types::{Entity, EntityId};

/// Ordered, id-indexed collection of one entity kind.
#[derive(Clone)]
pub struct Repository<T: Entity> {
    items: Vec<T>,
    index: HashMap<EntityId, usize>,
}

impl<T: Entity> Repository<T> {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build from records, rejecting duplicate ids.
    pub fn from_items(items: Vec<T>) -> KernelResult<Self> {
        let mut repo = Self::new();
        for item in items {
            repo.insert(item)?;
        }
        Ok(repo)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a record with this id exists.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a record by id.
    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    /// Look up a record by id for in-place mutation.
    ///
    /// The caller must not change the record's id.
    pub(crate) fn get_mut(&mut self, id: &EntityId) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&pos) => Some(&mut self.items[pos]),
            None => None,
        }
    }

    /// Look up a record or fail with `NOT_FOUND`.
    pub fn require(&self, id: &EntityId) -> KernelResult<&T> {
        self.get(id).ok_or_else(|| KernelError::not_found(T::KIND, id))
    }

    /// All records in insertion order.
    pub fn list(&self) -> &[T] {
        &self.items
    }

    /// Iterate records in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Append a record. Fails with `DUPLICATE_ID` if the id is taken.
    pub fn insert(&mut self, item: T) -> KernelResult<()> {
        let id = item.id().clone();
        if self.index.contains_key(&id) {
            return Err(KernelError::DuplicateId { kind: T::KIND, id });
        }
        self.index.insert(id, self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Shallow-merge a patch into the record with `id`.
    ///
    /// The merged record is validated before it replaces the stored one, so a
    /// rejected patch leaves the repository untouched. Returns the record as
    /// it was before and after the merge.
    pub fn update(&mut self, id: &EntityId, patch: T::Patch) -> KernelResult<(T, T)> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| KernelError::not_found(T::KIND, id))?;

        let before = self.items[pos].clone();
        let mut after = before.clone();
        after.apply_patch(patch);
        after.validate()?;

        self.items[pos] = after.clone();
        Ok((before, after))
    }
}

impl<T: Entity> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T: Entity + PartialEq> PartialEq for Repository<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Entity> Serialize for Repository<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Entity> Deserialize<'de> for Repository<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Self::from_items(items).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeviceClass, DeviceClassPatch, EntityStatus};

    fn repo_with(ids: &[&str]) -> Repository<DeviceClass> {
        let mut repo = Repository::new();
        for id in ids {
            repo.insert(DeviceClass::new(*id, id.to_uppercase(), format!("Device {}", id)))
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_insertion_order_preserved() {
        let repo = repo_with(&["dc-3", "dc-1", "dc-2"]);
        let ids: Vec<_> = repo.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["dc-3", "dc-1", "dc-2"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut repo = repo_with(&["dc-1"]);
        let err = repo.insert(DeviceClass::new("dc-1", "X", "Dup")).unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_ID");
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_update_returns_before_and_after() {
        let mut repo = repo_with(&["dc-1"]);
        let (before, after) = repo
            .update(
                &"dc-1".into(),
                DeviceClassPatch { status: Some(EntityStatus::Suspended), ..Default::default() },
            )
            .unwrap();

        assert_eq!(before.status, EntityStatus::Active);
        assert_eq!(after.status, EntityStatus::Suspended);
        assert_eq!(repo.get(&"dc-1".into()).unwrap().status, EntityStatus::Suspended);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut repo = repo_with(&[]);
        let err = repo.update(&"nope".into(), DeviceClassPatch::default()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_invalid_patch_leaves_record_untouched() {
        let mut repo = repo_with(&["dc-1"]);
        let err = repo
            .update(
                &"dc-1".into(),
                DeviceClassPatch { code: Some("bad code".into()), ..Default::default() },
            )
            .unwrap_err();

        assert_eq!(err.code(), "INVALID_FIELD");
        assert_eq!(repo.get(&"dc-1".into()).unwrap().code, "DC-1");
    }

    #[test]
    fn test_serializes_as_array() {
        let repo = repo_with(&["dc-1", "dc-2"]);
        let json = serde_json::to_value(&repo).unwrap();
        assert!(json.is_array());

        let back: Repository<DeviceClass> = serde_json::from_value(json).unwrap();
        assert_eq!(back, repo);
        assert!(back.contains(&"dc-2".into()));
    }

    #[test]
    fn test_deserialize_rejects_duplicates() {
        let json = serde_json::json!([
            {"id": "dc-1", "code": "A", "name": "A", "status": "ACTIVE"},
            {"id": "dc-1", "code": "B", "name": "B", "status": "ACTIVE"},
        ]);
        assert!(serde_json::from_value::<Repository<DeviceClass>>(json).is_err());
    }
}
