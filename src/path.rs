//! Dotted-path access over [`Value`] documents (component A).
//!
//! No array indexing: a path only ever walks object keys, so `a.0.b` treats
//! `"0"` as a literal object key, never an array index. Arrays are addressed
//! as whole values, per §4.A.

use std::collections::BTreeMap;

use crate::error::SchemaError;
use crate::value::Value;

/// Namespace for dotted-path joining. The query/update/sort compilers only
/// ever need to join a prefix and a key while walking a declaration tree —
/// they never need to hold on to a parsed path's segments, depth, or root —
/// so this stays a single associated function rather than an owning struct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path;

impl Path {
    /// Join `prefix` and `key` with a dot, unless `prefix` is empty — in
    /// which case `key` is returned unchanged. This is the fixed form of the
    /// query compiler's nested-path join (§4.D, §9 known bug): the source
    /// always joins with a dot, producing a leading `.` when `prefix` is
    /// empty. This implementation never emits that leading dot.
    pub fn join(prefix: &str, key: &str) -> String {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    }
}

/// Read `doc[path]`. Returns `None` if any intermediate key is missing or
/// any intermediate value is not an object — both are treated as "absent",
/// matching §4.A's "accessing a key on a non-mapping yields undefined (get)".
pub fn get<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        let object = current.as_object()?;
        current = object.get(segment)?;
    }
    Some(current)
}

/// Write `doc[path] = value`, creating missing intermediate objects as
/// needed. Fails if an intermediate key exists but holds a non-object value
/// (§4.A: "on `set`, missing intermediates are created as empty mappings;
/// accessing a key on a non-mapping ... raises").
pub fn set(doc: &mut Value, path: &str, value: Value) -> Result<(), SchemaError> {
    let segments: Vec<&str> = path.split('.').collect();
    set_segments(doc, &segments, value, path)
}

fn set_segments(
    doc: &mut Value,
    segments: &[&str],
    value: Value,
    full_path: &str,
) -> Result<(), SchemaError> {
    let (head, rest) = segments
        .split_first()
        .expect("path is never empty at this call site");

    if !matches!(doc, Value::Object(_)) {
        if matches!(doc, Value::Null) {
            *doc = Value::Object(BTreeMap::new());
        } else {
            return Err(SchemaError::PathNotObject {
                path: full_path.to_string(),
            });
        }
    }
    let object = doc.as_object_mut().expect("just ensured Object above");

    if rest.is_empty() {
        object.insert((*head).to_string(), value);
        return Ok(());
    }

    let child = object
        .entry((*head).to_string())
        .or_insert_with(|| Value::Object(BTreeMap::new()));
    set_segments(child, rest, value, full_path)
}

/// Remove `doc[path]`, returning the removed value if present. Empty parent
/// objects left behind are preserved, not pruned (§4.A: "the leaf key is
/// removed but empty parents are preserved").
pub fn del(doc: &mut Value, path: &str) -> Option<Value> {
    let segments: Vec<&str> = path.split('.').collect();
    del_segments(doc, &segments)
}

fn del_segments(doc: &mut Value, segments: &[&str]) -> Option<Value> {
    let (head, rest) = segments.split_first()?;
    let object = doc.as_object_mut()?;
    if rest.is_empty() {
        return object.remove(*head);
    }
    let child = object.get_mut(*head)?;
    del_segments(child, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Value {
        v.into()
    }

    #[test]
    fn get_nested_value() {
        let d = doc(json!({"a": {"b": {"c": 1}}}));
        assert_eq!(get(&d, "a.b.c"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn get_missing_returns_none() {
        let d = doc(json!({"a": {"b": 1}}));
        assert_eq!(get(&d, "a.x"), None);
        assert_eq!(get(&d, "a.b.c"), None);
    }

    #[test]
    fn set_creates_missing_intermediates() {
        let mut d = doc(json!({}));
        set(&mut d, "a.b.c", Value::Number(5.0)).unwrap();
        assert_eq!(get(&d, "a.b.c"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn set_through_non_object_errors() {
        let mut d = doc(json!({"a": 1}));
        let err = set(&mut d, "a.b", Value::Number(5.0)).unwrap_err();
        assert!(matches!(err, SchemaError::PathNotObject { .. }));
    }

    #[test]
    fn del_preserves_empty_parent() {
        let mut d = doc(json!({"a": {"b": 1}}));
        let removed = del(&mut d, "a.b");
        assert_eq!(removed, Some(Value::Number(1.0)));
        assert_eq!(get(&d, "a"), Some(&Value::Object(BTreeMap::new())));
    }

    #[test]
    fn path_join_avoids_leading_dot() {
        assert_eq!(Path::join("", "age"), "age");
        assert_eq!(Path::join("name", "first"), "name.first");
    }
}
