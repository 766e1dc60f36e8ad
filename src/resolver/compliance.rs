//! Effective compliance resolution.
//!
//! Under [`ComplianceMode::ClosestWins`] the nearest node in the chain (self
//! first) holding any binding decides the whole result. Under
//! [`ComplianceMode::Union`] bindings from self and every ancestor are merged
//! and the source names the most specific contributor.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KernelResult;
use crate::state::KernelState;
use crate::types::{BindingKey, ComplianceBinding, EffectiveCompliance, EntityId, Scope};

use super::chain::ScopeChain;

/// How bindings along the ancestor chain combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceMode {
    /// Nearest bound node wins outright.
    #[default]
    ClosestWins,
    /// Union over self and all ancestors.
    Union,
}

impl ComplianceMode {
    /// Parse `closest_wins` / `union` (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "closest_wins" | "closest-wins" => Some(Self::ClosestWins),
            "union" => Some(Self::Union),
            _ => None,
        }
    }
}

impl fmt::Display for ComplianceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClosestWins => write!(f, "closest_wins"),
            Self::Union => write!(f, "union"),
        }
    }
}

/// Resolve the frameworks and SOP profiles in force at one node.
///
/// Fails with `UNKNOWN_SCOPE_NODE` for a missing node. Bound ids that no
/// longer name a catalog entry are skipped.
pub fn resolve_effective_compliance(
    state: &KernelState,
    scope: Scope,
    scope_id: &EntityId,
    mode: ComplianceMode,
) -> KernelResult<EffectiveCompliance> {
    let chain = ScopeChain::build(state, scope, scope_id)?;

    let bound: Vec<&ComplianceBinding> = chain
        .links()
        .iter()
        .filter_map(|link| state.binding_at(&BindingKey::new(link.scope, link.id.clone())))
        .collect();

    let Some(closest) = bound.first() else {
        tracing::debug!(scope = %scope, scope_id = %scope_id, "no compliance binding in chain");
        return Ok(EffectiveCompliance::unbound());
    };

    let contributing: &[&ComplianceBinding] = match mode {
        ComplianceMode::ClosestWins => &bound[..1],
        ComplianceMode::Union => &bound,
    };

    let mut framework_ids = BTreeSet::new();
    let mut sop_ids = BTreeSet::new();
    for binding in contributing {
        framework_ids.extend(binding.regulatory_framework_ids.iter());
        sop_ids.extend(binding.sop_profile_ids.iter());
    }

    tracing::debug!(
        scope = %scope,
        scope_id = %scope_id,
        source_scope = %closest.scope,
        source_id = %closest.scope_id,
        %mode,
        "compliance resolved"
    );

    Ok(EffectiveCompliance {
        frameworks: framework_ids
            .into_iter()
            .filter_map(|id| state.frameworks.get(id).cloned())
            .collect(),
        sop_profiles: sop_ids
            .into_iter()
            .filter_map(|id| state.sop_profiles.get(id).cloned())
            .collect(),
        source_scope: closest.scope,
        source_id: Some(closest.scope_id.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::seed;

    fn bind(state: &mut KernelState, scope: Scope, id: &str, fws: &[&str], sops: &[&str]) {
        let row = ComplianceBinding {
            scope,
            scope_id: id.into(),
            regulatory_framework_ids: fws.iter().map(|s| EntityId::from(*s)).collect(),
            sop_profile_ids: sops.iter().map(|s| EntityId::from(*s)).collect(),
            updated_at: Utc::now(),
            updated_by: "tester".to_string(),
        };
        state.bindings.insert(row.key(), row);
    }

    fn ids(eff: &EffectiveCompliance) -> Vec<&str> {
        eff.frameworks.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_unbound_node() {
        let mut state = seed::seed_state();
        state.bindings.clear();
        let eff =
            resolve_effective_compliance(&state, Scope::Station, &"STN-A4".into(), ComplianceMode::ClosestWins)
                .unwrap();
        assert_eq!(eff, EffectiveCompliance::unbound());
    }

    #[test]
    fn test_closest_binding_wins() {
        let mut state = seed::seed_state();
        state.bindings.clear();
        bind(&mut state, Scope::Plant, "FAC-WB-01", &["FW-FSMA-204"], &["SOP-RECEIVING"]);
        bind(&mut state, Scope::Line, "LINE-A", &["FW-EU-GMP-11"], &[]);

        let eff =
            resolve_effective_compliance(&state, Scope::Station, &"STN-A4".into(), ComplianceMode::ClosestWins)
                .unwrap();
        assert_eq!(ids(&eff), vec!["FW-EU-GMP-11"]);
        assert!(eff.sop_profiles.is_empty());
        assert_eq!(eff.source_scope, Scope::Line);
        assert_eq!(eff.source_id, Some("LINE-A".into()));
    }

    #[test]
    fn test_union_merges_chain() {
        let mut state = seed::seed_state();
        state.bindings.clear();
        bind(&mut state, Scope::Plant, "FAC-WB-01", &["FW-FSMA-204"], &["SOP-RECEIVING"]);
        bind(&mut state, Scope::Line, "LINE-A", &["FW-EU-GMP-11"], &[]);

        let eff = resolve_effective_compliance(&state, Scope::Station, &"STN-A4".into(), ComplianceMode::Union)
            .unwrap();
        assert_eq!(ids(&eff), vec!["FW-EU-GMP-11", "FW-FSMA-204"]);
        assert_eq!(eff.sop_profiles.len(), 1);
        assert_eq!(eff.source_scope, Scope::Line);
    }

    #[test]
    fn test_dangling_catalog_ids_skipped() {
        let mut state = seed::seed_state();
        state.bindings.clear();
        bind(&mut state, Scope::Line, "LINE-A", &["FW-FSMA-204", "FW-GONE"], &[]);

        let eff =
            resolve_effective_compliance(&state, Scope::Line, &"LINE-A".into(), ComplianceMode::ClosestWins)
                .unwrap();
        assert_eq!(ids(&eff), vec!["FW-FSMA-204"]);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(ComplianceMode::from_str("UNION"), Some(ComplianceMode::Union));
        assert_eq!(ComplianceMode::from_str("closest_wins"), Some(ComplianceMode::ClosestWins));
        assert_eq!(ComplianceMode::from_str("nearest"), None);
    }
}
