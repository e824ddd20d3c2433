use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document value: JSON plus the two opaque host types (`DateTime`,
/// `Buffer`) a `SchemaType` may introduce at a path (§3).
///
/// Generic JSON decoding (`From<serde_json::Value>`) never produces
/// `DateTime`/`Buffer` — a bare string is ambiguous between "date", "hex
/// buffer", and "plain text". Those variants only appear once a
/// `SchemaType::parse` has inflated a specific path, which is why `Schema`'s
/// import stack exists at all. This mirrors `_parseDatabase`/`_exportDatabase`
/// in §4.C: generic (de)serialization gets you the base five variants,
/// per-path `parse`/`value` gets you the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Boolean(bool),
    Number(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Buffer(Vec<u8>),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Type-rank used to give `loose_compare` a total order across variants
    /// that otherwise have nothing in common. Arbitrary but stable.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Number(_) => 2,
            Value::Text(_) => 3,
            Value::DateTime(_) => 4,
            Value::Buffer(_) => 5,
            Value::Array(_) => 6,
            Value::Object(_) => 7,
        }
    }
}

/// The comparator backing `SchemaType::Base` (§4.D, §4.F: "unknown paths use
/// a base comparator"). Same-variant values compare structurally; mismatched
/// variants fall back to the arbitrary-but-stable type rank so the result is
/// always a total order, never a panic.
pub fn loose_compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Buffer(x), Value::Buffer(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                let ord = loose_compare(xi, yi);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for (xk, xv) in x.iter() {
                match y.get(xk) {
                    Some(yv) => {
                        let ord = loose_compare(xv, yv);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    None => return Ordering::Greater,
                }
            }
            x.len().cmp(&y.len())
        }
        _ => a.rank().cmp(&b.rank()),
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(b),
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s),
            Value::DateTime(d) => serde_json::Value::String(d.to_rfc3339()),
            Value::Buffer(b) => serde_json::Value::String(hex::encode(b)),
            Value::Array(a) => serde_json::Value::Array(a.into_iter().map(Into::into).collect()),
            Value::Object(o) => {
                serde_json::Value::Object(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json: serde_json::Value = self.clone().into();
        write!(f, "{json}")
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_for_base_variants() {
        let json = serde_json::json!({"a": 1, "b": [true, null, "x"]});
        let value: Value = json.clone().into();
        let back: serde_json::Value = value.into();
        assert_eq!(json, back);
    }

    #[test]
    fn date_time_encodes_as_rfc3339_string() {
        let dt: DateTime<Utc> = "2024-01-02T03:04:05Z".parse().unwrap();
        let value = Value::DateTime(dt);
        let json: serde_json::Value = value.into();
        assert_eq!(json, serde_json::Value::String("2024-01-02T03:04:05+00:00".into()));
    }

    #[test]
    fn buffer_encodes_as_hex_string() {
        let value = Value::Buffer(vec![0xde, 0xad, 0xbe, 0xef]);
        let json: serde_json::Value = value.into();
        assert_eq!(json, serde_json::Value::String("deadbeef".into()));
    }

    #[test]
    fn loose_compare_is_total_across_variants() {
        assert_eq!(loose_compare(&Value::Null, &Value::Null), Ordering::Equal);
        assert_eq!(
            loose_compare(&Value::Number(1.0), &Value::Text("x".into())),
            Ordering::Less
        );
        assert_eq!(
            loose_compare(&Value::Number(1.0), &Value::Number(2.0)),
            Ordering::Less
        );
    }

    #[test]
    fn loose_compare_arrays_lexicographic() {
        let a = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);
        let b = Value::Array(vec![Value::Number(1.0), Value::Number(3.0)]);
        assert_eq!(loose_compare(&a, &b), Ordering::Less);
    }
}
