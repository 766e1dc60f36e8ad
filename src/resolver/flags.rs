//! Effective capability-flag resolution.
//!
//! ## Algorithm
//!
//! 1. Direct override at exactly `(flag, scope, scope_id)` → that value,
//!    `is_overridden = true`.
//! 2. Otherwise walk the ancestor chain; the first ancestor holding an
//!    override decides, `is_overridden = false`.
//! 3. Otherwise the flag's `default_value`, `source_scope = GLOBAL`.
//!
//! Closest override wins. The result is a pure function of the state.

use crate::error::{KernelError, KernelResult};
use crate::state::KernelState;
use crate::types::{CapabilityFlag, EffectiveFlag, EntityId, OverrideKey, Scope};

use super::chain::ScopeChain;

/// Resolve one flag at one node.
///
/// Fails with `UNKNOWN_FLAG` for an unregistered flag and
/// `UNKNOWN_SCOPE_NODE` for a node that does not exist at `scope`.
pub fn resolve_effective_flag(
    state: &KernelState,
    flag_id: &EntityId,
    scope: Scope,
    scope_id: &EntityId,
) -> KernelResult<EffectiveFlag> {
    let flag = state
        .flag(flag_id)
        .ok_or_else(|| KernelError::UnknownFlag(flag_id.clone()))?;
    let chain = ScopeChain::build(state, scope, scope_id)?;
    Ok(resolve_on_chain(state, flag, &chain))
}

/// Resolve every registered flag at one node, ordered by flag id.
pub fn resolve_effective_flags(
    state: &KernelState,
    scope: Scope,
    scope_id: &EntityId,
) -> KernelResult<Vec<EffectiveFlag>> {
    let chain = ScopeChain::build(state, scope, scope_id)?;

    let mut flags: Vec<&CapabilityFlag> = state.flags().iter().collect();
    flags.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(flags
        .into_iter()
        .map(|flag| resolve_on_chain(state, flag, &chain))
        .collect())
}

/// Apply closest-wins over a prebuilt chain.
pub(crate) fn resolve_on_chain(
    state: &KernelState,
    flag: &CapabilityFlag,
    chain: &ScopeChain,
) -> EffectiveFlag {
    for (depth, link) in chain.links().iter().enumerate() {
        let key = OverrideKey::new(flag.id.clone(), link.scope, link.id.clone());
        if let Some(row) = state.override_at(&key) {
            tracing::trace!(
                flag_id = %flag.id,
                source_scope = %link.scope,
                source_id = %link.id,
                depth,
                "override found"
            );
            return EffectiveFlag {
                flag: flag.clone(),
                effective_value: row.value,
                source_scope: link.scope,
                source_id: Some(link.id.clone()),
                is_overridden: depth == 0,
            };
        }
    }

    tracing::trace!(flag_id = %flag.id, "no override in chain, using global default");
    EffectiveFlag {
        flag: flag.clone(),
        effective_value: flag.default_value,
        source_scope: Scope::Global,
        source_id: None,
        is_overridden: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::seed;
    use crate::types::CapabilityOverride;

    fn set(state: &mut KernelState, flag: &str, scope: Scope, id: &str, value: bool) {
        let row = CapabilityOverride {
            flag_id: flag.into(),
            scope,
            scope_id: id.into(),
            value,
            updated_at: Utc::now(),
            updated_by: "tester".to_string(),
        };
        state.overrides.insert(row.key(), row);
    }

    #[test]
    fn test_default_when_no_overrides() {
        let state = seed::seed_state();
        let eff = resolve_effective_flag(&state, &"STRICT_GATING".into(), Scope::Station, &"STN-A4".into())
            .unwrap();
        assert!(eff.effective_value);
        assert_eq!(eff.source_scope, Scope::Global);
        assert!(eff.source_id.is_none());
        assert!(!eff.is_overridden);
    }

    #[test]
    fn test_closest_override_wins() {
        let mut state = seed::seed_state();
        set(&mut state, "STRICT_GATING", Scope::Enterprise, "ENT-01", true);
        set(&mut state, "STRICT_GATING", Scope::Plant, "FAC-WB-01", false);
        set(&mut state, "STRICT_GATING", Scope::Line, "LINE-A", true);

        let eff = resolve_effective_flag(&state, &"STRICT_GATING".into(), Scope::Station, &"STN-A4".into())
            .unwrap();
        assert!(eff.effective_value);
        assert_eq!(eff.source_scope, Scope::Line);
        assert_eq!(eff.source_id, Some("LINE-A".into()));
        assert!(!eff.is_overridden);
    }

    #[test]
    fn test_direct_override_is_overridden() {
        let mut state = seed::seed_state();
        set(&mut state, "STRICT_GATING", Scope::Station, "STN-A4", false);

        let eff = resolve_effective_flag(&state, &"STRICT_GATING".into(), Scope::Station, &"STN-A4".into())
            .unwrap();
        assert!(!eff.effective_value);
        assert!(eff.is_overridden);
    }

    #[test]
    fn test_sibling_override_does_not_leak() {
        let mut state = seed::seed_state();
        set(&mut state, "STRICT_GATING", Scope::Line, "LINE-B", false);

        let eff = resolve_effective_flag(&state, &"STRICT_GATING".into(), Scope::Station, &"STN-A4".into())
            .unwrap();
        assert_eq!(eff.source_scope, Scope::Global);
    }

    #[test]
    fn test_global_query_ignores_scope_id() {
        let mut state = seed::seed_state();
        set(&mut state, "STRICT_GATING", Scope::Enterprise, "ENT-01", false);

        let eff = resolve_effective_flag(&state, &"STRICT_GATING".into(), Scope::Global, &"GLOBAL".into())
            .unwrap();
        assert!(eff.effective_value);
        assert_eq!(eff.source_scope, Scope::Global);
    }

    #[test]
    fn test_unknown_flag() {
        let state = seed::seed_state();
        let err = resolve_effective_flag(&state, &"NO_SUCH_FLAG".into(), Scope::Station, &"STN-A4".into())
            .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_FLAG");
    }

    #[test]
    fn test_list_is_sorted_and_complete() {
        let state = seed::seed_state();
        let all = resolve_effective_flags(&state, Scope::Line, &"LINE-A".into()).unwrap();
        assert_eq!(all.len(), state.flags().len());
        let ids: Vec<_> = all.iter().map(|e| e.flag.id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
