//! Error type for resolution and mutation operations.

use crate::types::{EntityId, EntityKind, EntityStatus, Scope};

/// Error returned by every kernel operation.
///
/// Each variant maps to a stable machine code via [`KernelError::code`].
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// Flag id is not registered.
    #[error("Unknown capability flag: {0}")]
    UnknownFlag(EntityId),

    /// Scope id does not name a node at the given scope.
    #[error("Unknown {scope} node: {scope_id}")]
    UnknownScopeNode {
        /// Requested scope.
        scope: Scope,
        /// Requested node id.
        scope_id: EntityId,
    },

    /// Parent reference is dangling or retired.
    #[error("Invalid parent for {kind} {id}: {parent_scope} {parent_id} {reason}")]
    InvalidParent {
        /// Kind of the record being created or moved.
        kind: EntityKind,
        /// Id of the record being created or moved.
        id: EntityId,
        /// Scope the parent must live at.
        parent_scope: Scope,
        /// Referenced parent id.
        parent_id: EntityId,
        /// "does not exist" or "is retired".
        reason: &'static str,
    },

    /// Record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing record.
        kind: EntityKind,
        /// Missing id.
        id: EntityId,
    },

    /// Record with this id already exists.
    #[error("{kind} already exists: {id}")]
    DuplicateId {
        /// Kind of the record.
        kind: EntityKind,
        /// Conflicting id.
        id: EntityId,
    },

    /// Operation is not defined at this scope.
    #[error("Operation not allowed at scope {scope}: {reason}")]
    InvalidScope {
        /// Offending scope.
        scope: Scope,
        /// Why the scope is rejected.
        reason: &'static str,
    },

    /// Status change not permitted by the lifecycle.
    #[error("Invalid status transition for {id}: {from} -> {to}")]
    InvalidStatusTransition {
        /// Node id.
        id: EntityId,
        /// Current status.
        from: EntityStatus,
        /// Requested status.
        to: EntityStatus,
    },

    /// Field failed validation.
    #[error("Invalid field '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Validation failure.
        reason: String,
    },

    /// Snapshot could not be written (or read back where that is required).
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl KernelError {
    /// Create a persistence error from any store error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::Persistence(e.to_string())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownFlag(_) => "UNKNOWN_FLAG",
            Self::UnknownScopeNode { .. } => "UNKNOWN_SCOPE_NODE",
            Self::InvalidParent { .. } => "INVALID_PARENT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DuplicateId { .. } => "DUPLICATE_ID",
            Self::InvalidScope { .. } => "INVALID_SCOPE",
            Self::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::InvalidField { .. } => "INVALID_FIELD",
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Whether the caller caused the failure (4xx-equivalent).
    ///
    /// Persistence failures are background warnings, not caller errors.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }

    pub(crate) fn not_found(kind: EntityKind, id: &EntityId) -> Self {
        Self::NotFound { kind, id: id.clone() }
    }

    pub(crate) fn unknown_node(scope: Scope, scope_id: &EntityId) -> Self {
        Self::UnknownScopeNode { scope, scope_id: scope_id.clone() }
    }
}

/// Result alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(KernelError::UnknownFlag("X".into()).code(), "UNKNOWN_FLAG");
        assert_eq!(
            KernelError::unknown_node(Scope::Station, &"STN-Z".into()).code(),
            "UNKNOWN_SCOPE_NODE"
        );
        assert_eq!(KernelError::Persistence("disk full".into()).code(), "PERSISTENCE_FAILURE");
    }

    #[test]
    fn test_persistence_is_not_client_error() {
        assert!(!KernelError::Persistence("io".into()).is_client_error());
        assert!(KernelError::not_found(EntityKind::Plant, &"P".into()).is_client_error());
    }

    #[test]
    fn test_display_names_node() {
        let err = KernelError::unknown_node(Scope::Line, &"LINE-Q".into());
        assert_eq!(err.to_string(), "Unknown LINE node: LINE-Q");
    }
}
