//! Flattening of nested source documents
//!
//! Nested objects are walked depth-first and every leaf is stored under the
//! dotted path of its parents, so `{"eee": {"fff": 1}}` becomes `eee.fff = "1"`.
//! Arrays are leaves.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::value_to_string;

/// A flattened record: dotted-path key to text, in first-seen key order.
///
/// `None` marks a `null` leaf; writers render it with their null string.
pub type FlatRecord = IndexMap<String, Option<String>>;

/// Flatten `source` into `out`, prefixing every key with `prefix`.
///
/// Keys colliding after flattening (`{"a.b": 1, "a": {"b": 2}}`) keep the
/// last written value at the position of the first one.
///
/// # Arguments
/// * `prefix` - Path of the enclosing object, including its trailing `.`
/// * `source` - Object to flatten
/// * `out` - Destination map, mutated in place
pub fn flatten(prefix: &str, source: &Map<String, Value>, out: &mut FlatRecord) {
    for (key, value) in source {
        match value {
            Value::Object(child) => {
                let child_prefix = format!("{prefix}{key}.");
                flatten(&child_prefix, child, out);
            }
            _ => {
                out.insert(format!("{prefix}{key}"), value_to_string(value));
            }
        }
    }
}

/// Flatten a whole source document.
pub fn flatten_source(source: &Map<String, Value>) -> FlatRecord {
    let mut out = FlatRecord::with_capacity(source.len());
    flatten("", source, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flatten_nested() {
        let source = object(json!({
            "aaa": "test",
            "bbb": 1,
            "eee": { "fff": "x", "ggg": { "hhh": 2.5 } },
            "tags": ["a", "b"]
        }));

        let flat = flatten_source(&source);
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["aaa", "bbb", "eee.fff", "eee.ggg.hhh", "tags"]);
        assert_eq!(flat["eee.ggg.hhh"].as_deref(), Some("2.5"));
        assert_eq!(flat["tags"].as_deref(), Some("[\"a\",\"b\"]"));
    }

    #[test]
    fn test_flatten_keeps_null() {
        let flat = flatten_source(&object(json!({ "a": null, "b": { "c": null } })));
        assert_eq!(flat.get("a"), Some(&None));
        assert_eq!(flat.get("b.c"), Some(&None));
    }

    #[test]
    fn test_flatten_prefix_and_collision() {
        let mut out = FlatRecord::new();
        flatten("root.", &object(json!({ "a.b": 1, "a": { "b": 2 } })), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out["root.a.b"].as_deref(), Some("2"));
    }

    #[test]
    fn test_flatten_empty_object_produces_no_keys() {
        let flat = flatten_source(&object(json!({ "empty": {} })));
        assert!(flat.is_empty());
    }
}
