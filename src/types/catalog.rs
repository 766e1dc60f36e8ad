//! Flat catalogs with no place in the topology: device classes and users.
//!
//! They only take part in the generic add/update contract and the audit log.

use serde::{Deserialize, Serialize};

use super::entity::{validate_code, validate_non_empty, Entity, EntityKind};
use super::scope::{EntityId, EntityStatus};
use crate::error::KernelError;

/// Class of shop-floor equipment (scanner, label printer, scale).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceClass {
    /// Stable identifier.
    pub id: EntityId,
    /// Short code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Catalog status.
    pub status: EntityStatus,
}

impl DeviceClass {
    /// Create an active device class.
    pub fn new(id: impl Into<EntityId>, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            name: name.into(),
            description: String::new(),
            status: EntityStatus::Active,
        }
    }
}

/// Shallow-merge update for a device class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceClassPatch {
    /// New code.
    #[serde(default)]
    pub code: Option<String>,
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
    /// New status.
    #[serde(default)]
    pub status: Option<EntityStatus>,
}

impl Entity for DeviceClass {
    type Patch = DeviceClassPatch;
    const KIND: EntityKind = EntityKind::DeviceClass;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn apply_patch(&mut self, patch: DeviceClassPatch) {
        if let Some(code) = patch.code {
            self.code = code;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }

    fn validate(&self) -> Result<(), KernelError> {
        validate_code("code", &self.code)?;
        validate_non_empty("name", &self.name)
    }
}

/// Platform user who acts on master data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier.
    pub id: EntityId,
    /// Login name.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Role name (`ADMIN`, `QA_LEAD`, `OPERATOR`).
    pub role: String,
    /// Account status.
    pub status: EntityStatus,
}

impl User {
    /// Create an active user.
    pub fn new(
        id: impl Into<EntityId>,
        username: impl Into<String>,
        display_name: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            display_name: display_name.into(),
            role: role.into(),
            status: EntityStatus::Active,
        }
    }
}

/// Shallow-merge update for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    /// New display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// New role.
    #[serde(default)]
    pub role: Option<String>,
    /// New status.
    #[serde(default)]
    pub status: Option<EntityStatus>,
}

impl Entity for User {
    type Patch = UserPatch;
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn apply_patch(&mut self, patch: UserPatch) {
        if let Some(display_name) = patch.display_name {
            self.display_name = display_name;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }

    fn validate(&self) -> Result<(), KernelError> {
        validate_non_empty("username", &self.username)?;
        validate_code("role", &self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_patch_keeps_username() {
        let mut user = User::new("U-1", "jdoe", "J. Doe", "OPERATOR");
        user.apply_patch(UserPatch { role: Some("QA_LEAD".into()), ..UserPatch::default() });
        assert_eq!(user.role, "QA_LEAD");
        assert_eq!(user.username, "jdoe");
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_device_class_validation() {
        assert!(DeviceClass::new("DC-1", "SCANNER", "Handheld scanner").validate().is_ok());
        assert!(DeviceClass::new("DC-2", "scanner", "Handheld scanner").validate().is_err());
    }
}
