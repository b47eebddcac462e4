//! Entity/relationship identifiers and the shard layout used by storage.

use serde::{Deserialize, Serialize};

/// Stable opaque identifier for an entity (noun) or relationship (verb).
///
/// Spec §3 recommends a UUID with a hex prefix for shardability; we don't
/// mandate the format, only that it's a non-empty string — callers that
/// want shard locality should use `EntityId::new_uuid`.
pub type EntityId = String;
pub type RelationId = String;

/// First two hex characters of an id's prefix, used to fan entities and
/// relationships out across 256 shards (spec §4.4).
pub fn shard_of(id: &str) -> String {
    if id.len() >= 2 {
        id[..2].to_lowercase()
    } else if id.is_empty() {
        "00".to_string()
    } else {
        format!("{:0<2}", id.to_lowercase())
    }
}

/// Generate a new id with a random hex prefix so ids spread evenly across
/// shards (spec §3: "recommend UUID with hex prefix for shardability").
pub fn new_id() -> EntityId {
    use rand_id::random_hex_prefixed_uuid;
    random_hex_prefixed_uuid()
}

mod rand_id {
    /// Minimal dependency-free UUID-v4-shaped id generator.
    ///
    /// We don't pull in the `uuid` crate for the core types crate since the
    /// only property callers need is "unique and shard-friendly", not
    /// RFC-4122 conformance; `triplex-vector`'s dev-dependencies already use
    /// `uuid` for test fixtures where exact conformance is exercised.
    pub fn random_hex_prefixed_uuid() -> String {
        let mut bytes = [0u8; 16];
        for b in bytes.iter_mut() {
            *b = (rand::random::<u8>()) as u8;
        }
        // Set version (4) and variant bits per RFC 4122 §4.4.
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}
