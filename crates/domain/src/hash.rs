//! Canonical content hashing.
//!
//! Story and context identities are content hashes over a canonical JSON
//! encoding (recursively sorted keys, compact separators), so equal
//! content always converges on the same row regardless of key order or
//! whitespace in the submitted document.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Render `value` in canonical form: object keys sorted recursively, no
/// extraneous whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Canonical encoding plus its SHA-256 hex digest.
pub fn content_hash(value: &Value) -> (String, String) {
    let canonical = canonical_json(value);
    let digest = Sha256::digest(canonical.as_bytes());
    (canonical, hex::encode(digest))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Keys are plain strings; serialization cannot fail.
                out.push_str(&serde_json::to_string(key).expect("string key"));
                out.push(':');
                write_canonical(&map[key.as_str()], out);
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
        scalar => {
            out.push_str(&serde_json::to_string(scalar).expect("scalar value"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_the_hash() {
        let a = json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(content_hash(&a).1, content_hash(&b).1);
    }

    #[test]
    fn canonical_form_is_sorted_and_compact() {
        let value = json!({"b": [1, 2], "a": "text"});
        assert_eq!(canonical_json(&value), r#"{"a":"text","b":[1,2]}"#);
    }

    #[test]
    fn digest_is_hex_sha256() {
        let (_, digest) = content_hash(&json!({"text": "hello"}));
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_content_differs() {
        let a = content_hash(&json!({"text": "hello"})).1;
        let b = content_hash(&json!({"text": "goodbye"})).1;
        assert_ne!(a, b);
    }
}
