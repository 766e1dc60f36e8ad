//! Identifier, scope and status types shared by every entity kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier for any master-data record.
///
/// Wraps the caller-supplied string (`"FAC-WB-01"`, `"STRICT_GATING"`) and
/// implements `Ord` so that maps keyed by it iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new EntityId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Specificity level at which a capability or compliance value can be set.
///
/// The derived ordering is the specificity ordering used by resolution:
/// `Global < Enterprise < Plant < Line < Station`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// Synthetic root level holding flag defaults.
    Global,
    /// Enterprise node (tree root).
    Enterprise,
    /// Plant node.
    Plant,
    /// Production line node.
    Line,
    /// Station node (most specific).
    Station,
}

impl Scope {
    /// All scopes from least to most specific.
    pub const ALL: [Scope; 5] = [
        Scope::Global,
        Scope::Enterprise,
        Scope::Plant,
        Scope::Line,
        Scope::Station,
    ];

    /// Parse scope from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GLOBAL" => Some(Self::Global),
            "ENTERPRISE" => Some(Self::Enterprise),
            "PLANT" => Some(Self::Plant),
            "LINE" => Some(Self::Line),
            "STATION" => Some(Self::Station),
            _ => None,
        }
    }

    /// The next less specific scope, or `None` for `Global`.
    pub fn parent(&self) -> Option<Scope> {
        match self {
            Self::Global => None,
            Self::Enterprise => Some(Self::Global),
            Self::Plant => Some(Self::Enterprise),
            Self::Line => Some(Self::Plant),
            Self::Station => Some(Self::Line),
        }
    }

    /// Whether this scope names a topology node (everything but `Global`).
    pub fn is_node(&self) -> bool {
        !matches!(self, Self::Global)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "GLOBAL"),
            Self::Enterprise => write!(f, "ENTERPRISE"),
            Self::Plant => write!(f, "PLANT"),
            Self::Line => write!(f, "LINE"),
            Self::Station => write!(f, "STATION"),
        }
    }
}

/// Lifecycle status of a master-data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    /// In service.
    Active,
    /// Temporarily out of service; may return to Active.
    Suspended,
    /// Terminal. Kept for audit, never hard-deleted.
    Retired,
}

impl EntityStatus {
    /// Parse status from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "SUSPENDED" => Some(Self::Suspended),
            "RETIRED" => Some(Self::Retired),
            _ => None,
        }
    }

    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// `Active <-> Suspended`, anything non-retired `-> Retired`.
    /// Setting the current status again is accepted as a no-op transition.
    pub fn can_transition_to(&self, next: EntityStatus) -> bool {
        match (self, next) {
            (Self::Retired, Self::Retired) => true,
            (Self::Retired, _) => false,
            _ => true,
        }
    }

    /// Whether the record is retired.
    pub fn is_retired(&self) -> bool {
        matches!(self, Self::Retired)
    }
}

impl Default for EntityStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::Retired => write!(f, "RETIRED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_specificity_ordering() {
        assert!(Scope::Global < Scope::Enterprise);
        assert!(Scope::Enterprise < Scope::Plant);
        assert!(Scope::Plant < Scope::Line);
        assert!(Scope::Line < Scope::Station);
    }

    #[test]
    fn test_scope_parent_chain() {
        let mut chain = vec![Scope::Station];
        while let Some(parent) = chain.last().and_then(|s| s.parent()) {
            chain.push(parent);
        }
        assert_eq!(
            chain,
            vec![Scope::Station, Scope::Line, Scope::Plant, Scope::Enterprise, Scope::Global]
        );
    }

    #[test]
    fn test_scope_serde_uses_screaming_case() {
        let json = serde_json::to_string(&Scope::Station).unwrap();
        assert_eq!(json, "\"STATION\"");
        assert_eq!(Scope::from_str("plant"), Some(Scope::Plant));
        assert_eq!(Scope::from_str("cell"), None);
    }

    #[test]
    fn test_retired_is_terminal() {
        assert!(EntityStatus::Active.can_transition_to(EntityStatus::Suspended));
        assert!(EntityStatus::Suspended.can_transition_to(EntityStatus::Active));
        assert!(EntityStatus::Suspended.can_transition_to(EntityStatus::Retired));
        assert!(!EntityStatus::Retired.can_transition_to(EntityStatus::Active));
        assert!(!EntityStatus::Retired.can_transition_to(EntityStatus::Suspended));
    }

    #[test]
    fn test_entity_id_is_transparent() {
        let id = EntityId::new("STN-A4");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"STN-A4\"");
        assert_eq!(id.to_string(), "STN-A4");
    }
}
