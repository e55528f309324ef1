//! Canonical hashing for anchor payloads
//!
//! The content hash anchored on the consensus log must be recomputable from
//! the same payload at any later time, in any runtime. Serialization order
//! is therefore fixed explicitly: object keys are sorted recursively before
//! hashing. Array order is preserved (it is semantic).

use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render a JSON value in canonical form: objects with sorted keys,
/// arrays in order, minimal separators.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json escaping for the key
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars already have a single serde_json rendering
        other => out.push_str(&other.to_string()),
    }
}

/// SHA-256 over the canonical form, as 64 lowercase hex chars
pub fn content_hash(value: &Value) -> String {
    let canonical = canonical_json(value);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash any serializable snapshot
pub fn hash_serializable<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    Ok(content_hash(&json))
}

/// Recompute-and-compare integrity check
///
/// True iff the current payload still hashes to the recorded value.
pub fn verify_content(expected_hash: &str, value: &Value) -> bool {
    content_hash(value) == expected_hash
}

/// Decode a 64-char hex content hash into raw leaf bytes
pub fn decode_hash(hash: &str) -> Result<[u8; 32]> {
    if hash.len() != 64 {
        return Err(Error::InvalidHash(format!(
            "expected 64 hex chars, got {}",
            hash.len()
        )));
    }
    let bytes = hex::decode(hash).map_err(|e| Error::InvalidHash(e.to_string()))?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
