//! Fixed seed dataset.
//!
//! Loaded on first boot and whenever the stored snapshot is unusable. The
//! dataset is deterministic (fixed timestamps, fixed ids) so two seeded
//! kernels have identical fingerprints.
//!
//! Topology:
//!
//! ```text
//! ENT-01
//! ├── FAC-WB-01
//! │   ├── LINE-A: STN-A1, STN-A2, STN-A3, STN-A4
//! │   └── LINE-B: STN-B1, STN-B2
//! └── FAC-RC-02
//!     └── LINE-C: STN-C1
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::KernelResult;
use crate::repository::Repository;
use crate::state::KernelState;
use crate::types::{
    AuditStamp, BindingKey, CapabilityFlag, ComplianceBinding, DeviceClass, Enterprise, EntityId,
    Line, NodeInfo, Plant, RegulatoryFramework, Scope, SopProfile, Station, User,
};

/// Actor recorded on seeded records.
pub const SEED_ACTOR: &str = "seed";

const ENTERPRISE: (&str, &str, &str) = ("ENT-01", "ENT-01", "Northwind Foods");

const PLANTS: &[(&str, &str, &str, &str)] = &[
    ("FAC-WB-01", "WB01", "Westbrook Bottling", "ENT-01"),
    ("FAC-RC-02", "RC02", "Riverside Cannery", "ENT-01"),
];

const LINES: &[(&str, &str, &str, &str)] = &[
    ("LINE-A", "LA", "Filling Line A", "FAC-WB-01"),
    ("LINE-B", "LB", "Packaging Line B", "FAC-WB-01"),
    ("LINE-C", "LC", "Retort Line C", "FAC-RC-02"),
];

const STATIONS: &[(&str, &str, &str, &str)] = &[
    ("STN-A1", "A1", "Depalletizer", "LINE-A"),
    ("STN-A2", "A2", "Rinser", "LINE-A"),
    ("STN-A3", "A3", "Filler", "LINE-A"),
    ("STN-A4", "A4", "Capper and Inspection", "LINE-A"),
    ("STN-B1", "B1", "Labeler", "LINE-B"),
    ("STN-B2", "B2", "Case Packer", "LINE-B"),
    ("STN-C1", "C1", "Retort", "LINE-C"),
];

/// `(id, label, category, default)`
const FLAGS: &[(&str, &str, &str, bool)] = &[
    ("STRICT_GATING", "Strict quality gating", "QUALITY", true),
    ("LOT_GENEALOGY", "Lot genealogy capture", "TRACEABILITY", true),
    ("EBR_SIGNOFF", "Electronic batch record sign-off", "QUALITY", false),
    ("AUTO_RELEASE", "Automatic lot release", "RELEASE", false),
    ("DOWNTIME_CAPTURE", "Operator downtime capture", "OPERATIONS", true),
];

/// Midnight UTC, 2024-01-01.
pub fn seed_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default()
}

/// Build the seed state.
pub fn seed_state() -> KernelState {
    // Static, collision-free ids: construction cannot fail.
    build().expect("seed dataset is consistent")
}

fn node(id: &str, code: &str, name: &str) -> NodeInfo {
    let mut info = NodeInfo::new(id, code, name, SEED_ACTOR);
    info.effective_from = seed_epoch();
    info.stamp = AuditStamp {
        created_by: SEED_ACTOR.to_string(),
        created_at: seed_epoch(),
        approved_by: Some(SEED_ACTOR.to_string()),
        approved_at: Some(seed_epoch()),
    };
    info
}

fn children(table: &[(&str, &str, &str, &str)], parent: &str) -> Vec<EntityId> {
    table
        .iter()
        .filter(|row| row.3 == parent)
        .map(|row| EntityId::from(row.0))
        .collect()
}

fn build() -> KernelResult<KernelState> {
    let mut state = KernelState::new();

    let (id, code, name) = ENTERPRISE;
    let mut enterprise = Enterprise::new(node(id, code, name));
    enterprise.plant_ids = children(PLANTS, id);
    state.enterprises.insert(enterprise)?;

    for &(id, code, name, parent) in PLANTS {
        let mut plant = Plant::new(node(id, code, name), parent);
        plant.line_ids = children(LINES, id);
        state.plants.insert(plant)?;
    }
    for &(id, code, name, parent) in LINES {
        let mut line = Line::new(node(id, code, name), parent);
        line.station_ids = children(STATIONS, id);
        state.lines.insert(line)?;
    }
    for &(id, code, name, parent) in STATIONS {
        state.stations.insert(Station::new(node(id, code, name), parent))?;
    }

    state.flags = Repository::from_items(
        FLAGS
            .iter()
            .map(|&(id, label, category, default)| CapabilityFlag::new(id, label, category, default))
            .collect(),
    )?;

    state.frameworks = Repository::from_items(vec![
        RegulatoryFramework::new("FW-FSMA-204", "FSMA-204", "FDA Food Traceability Rule", "US", true),
        RegulatoryFramework::new("FW-EU-GMP-11", "EU-GMP-ANNEX-11", "EU GMP Annex 11", "EU", true),
        RegulatoryFramework::new("FW-ISO-22000", "ISO-22000", "ISO 22000 Food Safety", "INTL", false),
    ])?;

    state.sop_profiles = Repository::from_items(vec![
        SopProfile::new("SOP-RECEIVING", "SOP-RCV-01", "Receiving and Inspection", "US", true),
        SopProfile::new("SOP-SANITATION", "SOP-SAN-02", "Line Sanitation", "US", true),
        SopProfile::new("SOP-CHANGEOVER", "SOP-CHG-03", "Product Changeover", "INTL", false),
    ])?;

    state.device_classes = Repository::from_items(vec![
        DeviceClass::new("DC-SCALE", "SCALE", "Checkweigher"),
        DeviceClass::new("DC-VISION", "VISION", "Vision inspection camera"),
        DeviceClass::new("DC-PLC", "PLC", "Line PLC"),
    ])?;

    state.users = Repository::from_items(vec![
        User::new("USR-ADMIN", "admin", "Platform Administrator", "ADMIN"),
        User::new("USR-QA", "qa.lead", "QA Lead", "QA_LEAD"),
        User::new("USR-OP", "operator", "Line Operator", "OPERATOR"),
    ])?;

    let binding = ComplianceBinding {
        scope: Scope::Plant,
        scope_id: "FAC-WB-01".into(),
        regulatory_framework_ids: BTreeSet::from([EntityId::from("FW-FSMA-204")]),
        sop_profile_ids: BTreeSet::from([
            EntityId::from("SOP-RECEIVING"),
            EntityId::from("SOP-SANITATION"),
        ]),
        updated_at: seed_epoch(),
        updated_by: SEED_ACTOR.to_string(),
    };
    state.bindings.insert(BindingKey::new(binding.scope, binding.scope_id.clone()), binding);

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Entity;

    #[test]
    fn test_seed_is_consistent() {
        let state = seed_state();
        assert!(state.integrity_issues().is_empty(), "{:?}", state.integrity_issues());
        assert_eq!(state.num_overrides(), 0);
    }

    #[test]
    fn test_seed_is_deterministic() {
        assert_eq!(seed_state().fingerprint(), seed_state().fingerprint());
    }

    #[test]
    fn test_seed_records_validate() {
        let state = seed_state();
        for e in state.enterprises() {
            e.validate().unwrap();
        }
        for p in state.plants() {
            p.validate().unwrap();
        }
        for l in state.lines() {
            l.validate().unwrap();
        }
        for s in state.stations() {
            s.validate().unwrap();
        }
        for f in state.flags() {
            f.validate().unwrap();
        }
        for fw in state.frameworks().iter() {
            fw.validate().unwrap();
        }
        for sop in state.sop_profiles().iter() {
            sop.validate().unwrap();
        }
    }

    #[test]
    fn test_scenario_chain_present() {
        let state = seed_state();
        let station = state.stations.get(&"STN-A4".into()).unwrap();
        assert_eq!(station.line_id.as_str(), "LINE-A");
        let line = state.lines.get(&"LINE-A".into()).unwrap();
        assert_eq!(line.plant_id.as_str(), "FAC-WB-01");
        assert!(state.flag(&"STRICT_GATING".into()).unwrap().default_value);
    }
}
