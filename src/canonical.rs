//! Canonical serialization for snapshot checksums.
//!
//! Snapshots carry an xxh64 checksum of their state so a truncated or
//! hand-edited file is detected at startup instead of being half-loaded.
//!
//! ## Determinism Guarantees
//!
//! - Struct fields serialize in declaration order
//! - Repositories serialize as arrays in insertion order
//! - Keyed tables are `BTreeMap`s and serialize in key order
//! - No `HashMap` is ever serialized

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Master-data types contain only strings, bools, timestamps and ordered
/// collections, all of which serialize infallibly.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return as a 16-digit hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OverrideKey, Scope};

    #[test]
    fn test_determinism() {
        let key = OverrideKey::new("STRICT_GATING", Scope::Line, "LINE-A");
        assert_eq!(canonical_hash(&key), canonical_hash(&key.clone()));
    }

    #[test]
    fn test_hex_is_fixed_width() {
        let hex = canonical_hash_hex(&Scope::Global);
        assert_eq!(hex.len(), 16);
    }

    #[test]
    fn test_distinct_values_hash_differently() {
        let a = OverrideKey::new("STRICT_GATING", Scope::Line, "LINE-A");
        let b = OverrideKey::new("STRICT_GATING", Scope::Line, "LINE-B");
        assert_ne!(canonical_hash_hex(&a), canonical_hash_hex(&b));
    }
}
