//! Canonical JSON serialization and value clone helpers
//!
//! Dependency hashing needs a byte-stable rendering of arbitrary JSON values:
//! object keys sorted lexicographically at every depth, array order preserved,
//! numbers in their shortest round-trip form. Two values that differ only in
//! object-key insertion order must canonicalize to identical bytes.

use serde_json::Value;

/// Deep-clone a JSON value.
///
/// Snapshots hand out clones of `value`/`raw` so downstream components can
/// never mutate resolver-owned state. Centralized here so the clone points are
/// auditable.
pub fn deep_clone(value: &Value) -> Value {
    value.clone()
}

/// Render a value canonically: sorted object keys, shortest numbers.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Canonical rendering as bytes, for hashing.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    canonical_string(value).into_bytes()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        // serde_json renders numbers via ryu/itoa which is already the
        // shortest round-trip representation.
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            out.push_str(&serde_json::to_string(s).expect("string serialization is infallible"))
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
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(
                    &serde_json::to_string(key).expect("string serialization is infallible"),
                );
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_at_every_depth() {
        let a = serde_json::from_str::<Value>(r#"{"b":{"y":1,"x":2},"a":3}"#).unwrap();
        assert_eq!(canonical_string(&a), r#"{"a":3,"b":{"x":2,"y":1}}"#);
    }

    #[test]
    fn key_order_does_not_affect_output() {
        let a = serde_json::from_str::<Value>(r#"{"x":1,"y":{"p":true,"q":null}}"#).unwrap();
        let b = serde_json::from_str::<Value>(r#"{"y":{"q":null,"p":true},"x":1}"#).unwrap();
        assert_eq!(canonical_string(&a), canonical_string(&b));
    }

    #[test]
    fn array_order_is_preserved() {
        let v = json!([3, 1, 2]);
        assert_eq!(canonical_string(&v), "[3,1,2]");
    }

    #[test]
    fn numbers_use_shortest_form() {
        let v = json!({"a": 0.5, "b": 10, "c": 1e21});
        assert_eq!(canonical_string(&v), r#"{"a":0.5,"b":10,"c":1e21}"#);
    }

    #[test]
    fn strings_are_json_escaped() {
        let v = json!({"msg": "line\nbreak \"quoted\""});
        assert_eq!(
            canonical_string(&v),
            r#"{"msg":"line\nbreak \"quoted\""}"#
        );
    }
}
