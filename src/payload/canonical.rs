//! Canonical serialization and checksum for the hand-off payload.
//!
//! The consumer re-verifies the checksum after transport, so the bytes fed
//! to the hash must be byte-identical on every run: object keys are sorted
//! recursively and the checksum field itself is nulled before hashing.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::HandoffPayload;

/// SHA-256 hex digest over the canonical JSON form of `payload`, with
/// `metadata.validation_checksum` forced to null.
pub fn checksum(payload: &HandoffPayload) -> String {
    let mut value = serde_json::to_value(payload)
        .expect("payload serialization cannot fail: no non-string map keys");

    if let Some(metadata) = value.get_mut("metadata") {
        metadata["validation_checksum"] = Value::Null;
    }

    let canonical = to_canonical_string(&value);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Serialize a JSON value deterministically: objects with keys in sorted
/// order, compact separators, stable number formatting via serde_json.
fn to_canonical_string(value: &Value) -> String {
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
                out.push_str(&serde_json::to_string(key).expect("string key"));
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
        // Scalars already have a single stable rendering.
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted_recursively() {
        let value = json!({"b": 1, "a": {"z": true, "y": [{"k": 2, "j": 3}]}});
        assert_eq!(
            to_canonical_string(&value),
            r#"{"a":{"y":[{"j":3,"k":2}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn scalars_render_stably() {
        assert_eq!(to_canonical_string(&json!(null)), "null");
        assert_eq!(to_canonical_string(&json!(0.5)), "0.5");
        assert_eq!(to_canonical_string(&json!("a \"quote\"")), r#""a \"quote\"""#);
    }

    #[test]
    fn array_order_is_preserved() {
        let value = json!([3, 1, 2]);
        assert_eq!(to_canonical_string(&value), "[3,1,2]");
    }
}
