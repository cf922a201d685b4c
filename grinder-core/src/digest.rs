//! Canonical JSON and deterministic digests (spec §9).
//!
//! Canonical JSON is sorted-key, compact-separator serialization with
//! decimal-string fields — the input to every digest used for replay-
//! stability tests and audit fingerprints.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serializes `value` as canonical JSON: `serde_json::Value` already sorts
/// object keys when the `preserve_order` feature is off (the default), and
/// `to_string` uses compact separators, so this is just a thin named
/// wrapper documenting the contract rather than extra machinery.
pub fn canonical_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let v = serde_json::to_value(value)?;
    serde_json::to_string(&v)
}

/// SHA-256 of `input`, truncated to the first 16 hex characters (spec §9).
pub fn digest16(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)[..16].to_string()
}

/// Convenience: canonical-JSON-then-digest16 for any serializable value.
pub fn digest_of<T: Serialize>(value: &T) -> serde_json::Result<String> {
    Ok(digest16(&canonical_json(value)?))
}
