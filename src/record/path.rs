//! Path lookups inside nested documents
//!
//! Paths use dotted segments for object keys and bracketed integers for
//! array positions: `a.b[2].c`. A missing key, an out-of-range index, a
//! non-numeric index into an array or a scalar in the middle of the path
//! all resolve to "absent".

use serde_json::{Map, Value};

/// Split a path into its segments.
///
/// # Arguments
/// * `path` - Path such as `location.points[0].lon`
///
/// # Returns
/// * `Vec<&str>` - Non-empty, trimmed segments
pub fn segments(path: &str) -> Vec<&str> {
    path.split(['.', '[', ']'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|ix| items.get(ix)),
        _ => None,
    }
}

fn step_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |ix| items.get_mut(ix)),
        _ => None,
    }
}

/// Resolve `path` in `root`; `null` counts as absent.
pub fn get<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let parts = segments(path);
    let (first, rest) = parts.split_first()?;
    let mut current = root.get(*first)?;
    for segment in rest {
        current = step(current, segment)?;
    }
    if current.is_null() { None } else { Some(current) }
}

/// Remove the value at `path` from `root`, returning it.
///
/// Object keys are removed preserving the order of the remaining keys.
pub fn remove(root: &mut Map<String, Value>, path: &str) -> Option<Value> {
    let parts = segments(path);
    let (last, parents) = parts.split_last()?;

    if parents.is_empty() {
        return root.shift_remove(*last);
    }

    let (first, rest) = parents.split_first()?;
    let mut current = root.get_mut(*first)?;
    for segment in rest {
        current = step_mut(current, segment)?;
    }

    match current {
        Value::Object(map) => map.shift_remove(*last),
        Value::Array(items) => {
            let ix = last.parse::<usize>().ok()?;
            if ix < items.len() {
                Some(items.remove(ix))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Map<String, Value> {
        json!({
            "name": "station",
            "a": { "b": [ { "c": 1 }, { "c": 2 }, { "c": [10.5, 20.25] } ] },
            "empty": null
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_segments() {
        assert_eq!(segments("a.b[2].c"), vec!["a", "b", "2", "c"]);
        assert_eq!(segments(" a . b "), vec!["a", "b"]);
        assert!(segments("").is_empty());
    }

    #[test]
    fn test_get_nested_and_indexed() {
        let doc = doc();
        assert_eq!(get(&doc, "name"), Some(&json!("station")));
        assert_eq!(get(&doc, "a.b[1].c"), Some(&json!(2)));
        assert_eq!(get(&doc, "a.b[2].c"), Some(&json!([10.5, 20.25])));
    }

    #[test]
    fn test_get_absent_paths() {
        let doc = doc();
        assert_eq!(get(&doc, "missing"), None);
        assert_eq!(get(&doc, "a.b[9].c"), None);
        assert_eq!(get(&doc, "a.b[x]"), None);
        assert_eq!(get(&doc, "name.inner"), None);
        assert_eq!(get(&doc, "empty"), None);
        assert_eq!(get(&doc, ""), None);
    }

    #[test]
    fn test_remove() {
        let mut doc = doc();
        assert_eq!(remove(&mut doc, "a.b[2].c"), Some(json!([10.5, 20.25])));
        assert_eq!(get(&doc, "a.b[2].c"), None);

        assert_eq!(remove(&mut doc, "a.b[0]"), Some(json!({ "c": 1 })));
        assert_eq!(get(&doc, "a.b[0].c"), Some(&json!(2)));

        assert_eq!(remove(&mut doc, "name"), Some(json!("station")));
        let keys: Vec<&String> = doc.keys().collect();
        assert_eq!(keys, vec!["a", "empty"]);

        assert_eq!(remove(&mut doc, "nothing.here"), None);
    }
}
