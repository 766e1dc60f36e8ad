//! Ancestor chain construction.
//!
//! The chain for a node lists the node itself followed by each ancestor
//! reached through parent pointers, most specific first:
//! `STATION → LINE → PLANT → ENTERPRISE`. GLOBAL is never a link; it is the
//! implicit fallback after the last one.

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, KernelResult};
use crate::state::KernelState;
use crate::types::{EntityId, Scope};

/// One node on the path from a queried node up to its enterprise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// Level of this node.
    pub scope: Scope,
    /// Id of this node.
    pub id: EntityId,
}

/// Self-then-ancestors chain for one queried node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeChain {
    links: Vec<ChainLink>,
}

impl ScopeChain {
    /// Build the chain for `scope`/`scope_id`.
    ///
    /// Fails with `UNKNOWN_SCOPE_NODE` when the queried node does not exist.
    /// For `Global` the chain is empty and `scope_id` is ignored.
    ///
    /// A dangling parent pointer ends the walk: the missing ancestor is
    /// skipped and, having no pointer of its own, so is everything above it.
    /// Resolution then falls through to GLOBAL without error.
    pub fn build(state: &KernelState, scope: Scope, scope_id: &EntityId) -> KernelResult<Self> {
        if scope == Scope::Global {
            return Ok(Self::default());
        }
        if !state.node_exists(scope, scope_id) {
            return Err(KernelError::unknown_node(scope, scope_id));
        }

        let mut links = vec![ChainLink { scope, id: scope_id.clone() }];
        let mut current = (scope, scope_id.clone());

        // Parent scope is strictly less specific at every step, so this
        // terminates after at most four links.
        while let Some((parent_scope, parent_id)) = state.parent_of(current.0, &current.1) {
            if !state.node_exists(parent_scope, parent_id) {
                tracing::warn!(
                    scope = %current.0,
                    scope_id = %current.1,
                    parent_scope = %parent_scope,
                    parent_id = %parent_id,
                    "dangling parent pointer, falling through to GLOBAL"
                );
                break;
            }
            let next = (parent_scope, parent_id.clone());
            links.push(ChainLink { scope: next.0, id: next.1.clone() });
            current = next;
        }

        Ok(Self { links })
    }

    /// Links, most specific first.
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// The queried node itself (`None` for Global).
    pub fn origin(&self) -> Option<&ChainLink> {
        self.links.first()
    }

    /// Number of links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the chain is empty (Global query).
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    #[test]
    fn test_station_chain_reaches_enterprise() {
        let state = seed::seed_state();
        let chain = ScopeChain::build(&state, Scope::Station, &"STN-A4".into()).unwrap();

        let scopes: Vec<_> = chain.links().iter().map(|l| l.scope).collect();
        assert_eq!(scopes, vec![Scope::Station, Scope::Line, Scope::Plant, Scope::Enterprise]);
        assert_eq!(chain.links()[1].id.as_str(), "LINE-A");
        assert_eq!(chain.links()[2].id.as_str(), "FAC-WB-01");
    }

    #[test]
    fn test_enterprise_chain_is_self_only() {
        let state = seed::seed_state();
        let chain = ScopeChain::build(&state, Scope::Enterprise, &"ENT-01".into()).unwrap();
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_global_chain_is_empty() {
        let state = seed::seed_state();
        let chain = ScopeChain::build(&state, Scope::Global, &"anything".into()).unwrap();
        assert!(chain.is_empty());
        assert!(chain.origin().is_none());
    }

    #[test]
    fn test_unknown_node_rejected() {
        let state = seed::seed_state();
        let err = ScopeChain::build(&state, Scope::Station, &"STN-404".into()).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_SCOPE_NODE");
    }

    #[test]
    fn test_scope_mismatch_rejected() {
        let state = seed::seed_state();
        // LINE-A exists, but not as a station.
        let err = ScopeChain::build(&state, Scope::Station, &"LINE-A".into()).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_SCOPE_NODE");
    }
}
