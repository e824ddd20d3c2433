use std::cmp::Ordering;
use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::error::{OperatorError, ValidationError};
use crate::types::custom::CustomSchemaType;
use crate::types::id::DocumentId;
use crate::types::operators::{canonical_query_op, universal_query_op, universal_update_op, UpdateOutcome};
use crate::types::options::TypeOptions;
use crate::value::{loose_compare, Value};

/// The polymorphic descriptor of one path's type (§3). Built-ins are a
/// closed, tagged enum rather than an open trait-object hierarchy, per the
/// dynamic-dispatch redesign note in the source design notes; `Custom` is
/// the escape hatch for constructors supplied directly in a schema
/// declaration (§4.B).
#[derive(Debug, Clone)]
pub enum SchemaType {
    String(TypeOptions),
    Number(TypeOptions),
    Boolean(TypeOptions),
    Array {
        child: Box<SchemaType>,
        options: TypeOptions,
    },
    Object(TypeOptions),
    Date(TypeOptions),
    Buffer(TypeOptions),
    Id(TypeOptions),
    Virtual(TypeOptions),
    /// Synthesized for unknown paths referenced by a query/update/sort
    /// document (§4.D, §4.E, §4.F, §7): equality/compare only, no default,
    /// never required.
    Base,
    Custom(Arc<dyn CustomSchemaType>),
}

impl SchemaType {
    pub fn name(&self) -> &str {
        match self {
            SchemaType::String(_) => "String",
            SchemaType::Number(_) => "Number",
            SchemaType::Boolean(_) => "Boolean",
            SchemaType::Array { .. } => "Array",
            SchemaType::Object(_) => "Object",
            SchemaType::Date(_) => "Date",
            SchemaType::Buffer(_) => "Buffer",
            SchemaType::Id(_) => "Id",
            SchemaType::Virtual(_) => "Virtual",
            SchemaType::Base => "Base",
            SchemaType::Custom(c) => c.name(),
        }
    }

    pub fn options(&self) -> Option<&TypeOptions> {
        match self {
            SchemaType::String(o)
            | SchemaType::Number(o)
            | SchemaType::Boolean(o)
            | SchemaType::Object(o)
            | SchemaType::Date(o)
            | SchemaType::Buffer(o)
            | SchemaType::Id(o)
            | SchemaType::Virtual(o) => Some(o),
            SchemaType::Array { options, .. } => Some(options),
            SchemaType::Base | SchemaType::Custom(_) => None,
        }
    }

    pub fn is_required(&self) -> bool {
        match self {
            SchemaType::Custom(c) => c.is_required(),
            _ => self.options().map(|o| o.required).unwrap_or(false),
        }
    }

    fn default_value(&self) -> Option<Value> {
        match self {
            SchemaType::Id(opts) => Some(
                opts.default
                    .as_ref()
                    .map(|d| d.resolve())
                    .unwrap_or_else(|| Value::Text(DocumentId::new().to_string())),
            ),
            SchemaType::Custom(c) => c.default_value(),
            _ => self.options().and_then(|o| o.default.as_ref()).map(|d| d.resolve()),
        }
    }

    /// Ingress transform into the in-memory document form (§3: `cast`).
    /// `null`/absent substitutes the default. An `Array` path casts each
    /// element through `child`, so an `Array{ child: Date }`/`Buffer` path
    /// gets its elements inflated the same way a bare `Date`/`Buffer` path
    /// does.
    pub fn cast(&self, value: Option<&Value>) -> Option<Value> {
        if let SchemaType::Custom(c) = self {
            return c.cast(value);
        }
        match (self, value) {
            (_, None) | (_, Some(Value::Null)) => self.default_value(),
            (SchemaType::Array { child, .. }, Some(Value::Array(items))) => Some(Value::Array(
                items.iter().map(|item| child.cast(Some(item)).unwrap_or(Value::Null)).collect(),
            )),
            (_, Some(v)) => Some(self.coerce(v)),
        }
    }

    /// Best-effort coercion applied on ingress, beyond plain pass-through —
    /// e.g. an RFC3339 string handed to a `Date` path, or a hex string
    /// handed to a `Buffer` path.
    fn coerce(&self, value: &Value) -> Value {
        match (self, value) {
            (SchemaType::Date(_), Value::Text(s)) => s
                .parse::<chrono::DateTime<chrono::Utc>>()
                .map(Value::DateTime)
                .unwrap_or_else(|_| value.clone()),
            (SchemaType::Buffer(_), Value::Text(s)) => hex::decode(s)
                .map(Value::Buffer)
                .unwrap_or_else(|_| value.clone()),
            _ => value.clone(),
        }
    }

    /// Egress transform before persistence (§3: `validate`); enforces
    /// `required`. An explicitly present `Value::Null` is treated the same
    /// as an absent value, matching `cast`'s null/absent-substitutes-default
    /// treatment.
    pub fn validate(&self, value: Option<&Value>) -> Result<Option<Value>, ValidationError> {
        if let SchemaType::Custom(c) = self {
            return c.validate(value);
        }
        let present = match value {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        };
        if present.is_none() && self.is_required() {
            return Err(ValidationError::RequiredFieldMissing {
                path: self.name().to_string(),
            });
        }
        if let Some(v) = present {
            self.check_shape(v)?;
        }
        Ok(value.cloned())
    }

    fn check_shape(&self, value: &Value) -> Result<(), ValidationError> {
        match self {
            SchemaType::Array { child, .. } => match value {
                Value::Array(items) => {
                    for item in items {
                        child.check_shape(item)?;
                    }
                    Ok(())
                }
                other => Err(ValidationError::InvalidValue {
                    path: self.name().to_string(),
                    reason: format!("expected an Array value, got {other:?}"),
                }),
            },
            _ => {
                let ok = match self {
                    SchemaType::String(_) | SchemaType::Id(_) => matches!(value, Value::Text(_)),
                    SchemaType::Number(_) => matches!(value, Value::Number(_)),
                    SchemaType::Boolean(_) => matches!(value, Value::Boolean(_)),
                    SchemaType::Object(_) => matches!(value, Value::Object(_)),
                    SchemaType::Date(_) => matches!(value, Value::DateTime(_)),
                    SchemaType::Buffer(_) => matches!(value, Value::Buffer(_)),
                    SchemaType::Virtual(_) | SchemaType::Base | SchemaType::Custom(_) => true,
                    SchemaType::Array { .. } => unreachable!("handled above"),
                };
                if ok {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidValue {
                        path: self.name().to_string(),
                        reason: format!("expected a {} value, got {value:?}", self.name()),
                    })
                }
            }
        }
    }

    /// Decode persisted form into runtime form (§3: `parse`). An `Array`
    /// path decodes each element through `child`.
    pub fn parse(&self, value: &Value) -> Value {
        if let SchemaType::Custom(c) = self {
            return c.parse(value);
        }
        match (self, value) {
            (SchemaType::Array { child, .. }, Value::Array(items)) => {
                Value::Array(items.iter().map(|item| child.parse(item)).collect())
            }
            _ => self.coerce(value),
        }
    }

    /// Encode runtime form into persisted form (§3: `value`). `Virtual`
    /// fields are always dropped from the persisted document; an `Array`
    /// path encodes each element through `child`.
    pub fn value(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (SchemaType::Virtual(_), _) => None,
            (SchemaType::Custom(c), _) => c.value(value),
            (SchemaType::Array { child, .. }, Value::Array(items)) => Some(Value::Array(
                items.iter().filter_map(|item| child.value(item)).collect(),
            )),
            _ => Some(value.clone()),
        }
    }

    /// Total order for sorting (§3: `compare`).
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match self {
            SchemaType::Custom(c) => c.compare(a, b),
            _ => loose_compare(a, b),
        }
    }

    /// Default equality-style predicate (§3: `match`).
    pub fn matches(&self, value: Option<&Value>, query: &Value) -> bool {
        if let SchemaType::Custom(c) = self {
            return c.matches(value, query);
        }
        value.map(|v| self.compare(v, query) == Ordering::Equal).unwrap_or(false)
    }

    /// Resolve and apply a named query operator (§4.B: token `$foo` becomes
    /// method `q$foo`). Unknown operators are compile-time errors.
    pub fn query_op(
        &self,
        op: &str,
        value: Option<&Value>,
        query: &Value,
    ) -> Result<bool, OperatorError> {
        if let SchemaType::Custom(c) = self {
            return c.query_op(op, value, query);
        }
        let op = canonical_query_op(op);
        if let Some(result) = universal_query_op(self, op, value, query)? {
            return Ok(result);
        }
        match self {
            SchemaType::String(_) if op == "$regex" => {
                let pattern = query.as_str().ok_or_else(|| OperatorError::IncompatibleValue {
                    type_name: self.name().to_string(),
                    op: op.to_string(),
                    reason: "$regex expects a string pattern".to_string(),
                })?;
                let re = Regex::new(pattern).map_err(|e| OperatorError::IncompatibleValue {
                    type_name: self.name().to_string(),
                    op: op.to_string(),
                    reason: format!("invalid pattern: {e}"),
                })?;
                Ok(value.and_then(Value::as_str).map(|s| re.is_match(s)).unwrap_or(false))
            }
            _ => {
                debug!(type_name = self.name(), op, "unknown query operator");
                Err(OperatorError::UnknownQueryOperator {
                    type_name: self.name().to_string(),
                    op: op.to_string(),
                })
            }
        }
    }

    /// Resolve and apply a named update operator (§4.B: token `$foo`
    /// becomes method `u$foo`).
    pub fn update_op(
        &self,
        op: &str,
        value: Option<&Value>,
        update: &Value,
    ) -> Result<UpdateOutcome, OperatorError> {
        if let SchemaType::Custom(c) = self {
            let replacement = c.update_op(op, value, update)?;
            return Ok(match replacement {
                Some(v) => UpdateOutcome::SetTo(v),
                None => UpdateOutcome::Delete,
            });
        }
        if let Some(outcome) = universal_update_op(self, op, update)? {
            return Ok(outcome);
        }
        match self {
            SchemaType::Number(_) if op == "$inc" => {
                let delta = update.as_f64().ok_or_else(|| incompatible(self, op, "$inc expects a number"))?;
                let current = value.and_then(Value::as_f64).unwrap_or(0.0);
                Ok(UpdateOutcome::SetTo(Value::Number(current + delta)))
            }
            SchemaType::Number(_) if op == "$mul" => {
                let factor = update.as_f64().ok_or_else(|| incompatible(self, op, "$mul expects a number"))?;
                let current = value.and_then(Value::as_f64).unwrap_or(0.0);
                Ok(UpdateOutcome::SetTo(Value::Number(current * factor)))
            }
            SchemaType::Array { child, .. } if op == "$push" => {
                let mut items = value.and_then(Value::as_array).map(<[Value]>::to_vec).unwrap_or_default();
                items.push(child.cast(Some(update)).unwrap_or_else(|| update.clone()));
                Ok(UpdateOutcome::SetTo(Value::Array(items)))
            }
            SchemaType::Array { child, .. } if op == "$pull" => {
                let items = value.and_then(Value::as_array).map(<[Value]>::to_vec).unwrap_or_default();
                let kept: Vec<Value> = items
                    .into_iter()
                    .filter(|item| child.compare(item, update) != Ordering::Equal)
                    .collect();
                Ok(UpdateOutcome::SetTo(Value::Array(kept)))
            }
            SchemaType::Array { child, .. } if op == "$addToSet" => {
                let mut items = value.and_then(Value::as_array).map(<[Value]>::to_vec).unwrap_or_default();
                let already_present = items.iter().any(|item| child.compare(item, update) == Ordering::Equal);
                if !already_present {
                    items.push(child.cast(Some(update)).unwrap_or_else(|| update.clone()));
                }
                Ok(UpdateOutcome::SetTo(Value::Array(items)))
            }
            _ => {
                debug!(type_name = self.name(), op, "unknown update operator");
                Err(OperatorError::UnknownUpdateOperator {
                    type_name: self.name().to_string(),
                    op: op.to_string(),
                })
            }
        }
    }
}

fn incompatible(ty: &SchemaType, op: &str, reason: &str) -> OperatorError {
    OperatorError::IncompatibleValue {
        type_name: ty.name().to_string(),
        op: op.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::options::DefaultValue;

    #[test]
    fn cast_substitutes_default_on_null_or_absent() {
        let ty = SchemaType::Number(TypeOptions::new().with_default(DefaultValue::constant(Value::Number(42.0))));
        assert_eq!(ty.cast(None), Some(Value::Number(42.0)));
        assert_eq!(ty.cast(Some(&Value::Null)), Some(Value::Number(42.0)));
        assert_eq!(ty.cast(Some(&Value::Number(1.0))), Some(Value::Number(1.0)));
    }

    #[test]
    fn id_default_autogenerates() {
        let ty = SchemaType::Id(TypeOptions::new());
        let generated = ty.cast(None).unwrap();
        assert!(matches!(generated, Value::Text(ref s) if s.starts_with("doc_")));
    }

    #[test]
    fn validate_required_missing() {
        let ty = SchemaType::String(TypeOptions::new().required());
        let err = ty.validate(None).unwrap_err();
        assert!(matches!(err, ValidationError::RequiredFieldMissing { .. }));
    }

    #[test]
    fn validate_required_explicit_null_is_missing() {
        let ty = SchemaType::String(TypeOptions::new().required());
        let err = ty.validate(Some(&Value::Null)).unwrap_err();
        assert!(matches!(err, ValidationError::RequiredFieldMissing { .. }));
    }

    #[test]
    fn validate_optional_null_passes_through_without_shape_check() {
        let ty = SchemaType::Number(TypeOptions::new());
        assert_eq!(ty.validate(Some(&Value::Null)).unwrap(), Some(Value::Null));
    }

    #[test]
    fn virtual_never_persists() {
        let ty = SchemaType::Virtual(TypeOptions::new());
        assert_eq!(ty.value(&Value::Number(1.0)), None);
    }

    #[test]
    fn date_coerces_rfc3339_string() {
        let ty = SchemaType::Date(TypeOptions::new());
        let cast = ty.cast(Some(&Value::Text("2024-01-01T00:00:00Z".into()))).unwrap();
        assert!(matches!(cast, Value::DateTime(_)));
    }

    #[test]
    fn buffer_coerces_hex_string() {
        let ty = SchemaType::Buffer(TypeOptions::new());
        let cast = ty.cast(Some(&Value::Text("deadbeef".into()))).unwrap();
        assert_eq!(cast, Value::Buffer(vec![0xde, 0xad, 0xbe, 0xef]));
    }

    #[test]
    fn number_inc_and_mul() {
        let ty = SchemaType::Number(TypeOptions::new());
        let outcome = ty.update_op("$inc", Some(&Value::Number(5.0)), &Value::Number(1.0)).unwrap();
        assert_eq!(outcome, UpdateOutcome::SetTo(Value::Number(6.0)));
        let outcome = ty.update_op("$mul", Some(&Value::Number(5.0)), &Value::Number(2.0)).unwrap();
        assert_eq!(outcome, UpdateOutcome::SetTo(Value::Number(10.0)));
    }

    #[test]
    fn array_push_pull_add_to_set() {
        let ty = SchemaType::Array {
            child: Box::new(SchemaType::Number(TypeOptions::new())),
            options: TypeOptions::new(),
        };
        let base = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);

        let pushed = ty.update_op("$push", Some(&base), &Value::Number(3.0)).unwrap();
        assert_eq!(
            pushed,
            UpdateOutcome::SetTo(Value::Array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]))
        );

        let pulled = ty.update_op("$pull", Some(&base), &Value::Number(1.0)).unwrap();
        assert_eq!(pulled, UpdateOutcome::SetTo(Value::Array(vec![Value::Number(2.0)])));

        let added_dup = ty.update_op("$addToSet", Some(&base), &Value::Number(1.0)).unwrap();
        assert_eq!(added_dup, UpdateOutcome::SetTo(base.clone()));

        let added_new = ty.update_op("$addToSet", Some(&base), &Value::Number(9.0)).unwrap();
        assert_eq!(
            added_new,
            UpdateOutcome::SetTo(Value::Array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(9.0)]))
        );
    }

    #[test]
    fn array_of_date_recurses_through_child_on_cast_parse_and_value() {
        let ty = SchemaType::Array {
            child: Box::new(SchemaType::Date(TypeOptions::new())),
            options: TypeOptions::new(),
        };
        let raw = Value::Array(vec![
            Value::Text("2024-01-01T00:00:00Z".into()),
            Value::Text("2024-06-15T12:30:00Z".into()),
        ]);

        let cast = ty.cast(Some(&raw)).unwrap();
        match &cast {
            Value::Array(items) => {
                assert!(items.iter().all(|item| matches!(item, Value::DateTime(_))));
            }
            other => panic!("expected Array, got {other:?}"),
        }
        ty.validate(Some(&cast)).unwrap();

        let parsed = ty.parse(&raw);
        match &parsed {
            Value::Array(items) => {
                assert!(items.iter().all(|item| matches!(item, Value::DateTime(_))));
            }
            other => panic!("expected Array, got {other:?}"),
        }

        let exported = ty.value(&cast).unwrap();
        match exported {
            Value::Array(items) => {
                // `value` hands each element to `child`, which for a bare
                // `Date` leaves it as `Value::DateTime` — the encode to a
                // JSON string happens at the `Into<serde_json::Value>`
                // boundary, not inside `value`.
                assert!(items.iter().all(|item| matches!(item, Value::DateTime(_))));
            }
            other => panic!("expected Array, got {other:?}"),
        }
    }

    #[test]
    fn array_check_shape_rejects_wrong_element_type() {
        let ty = SchemaType::Array {
            child: Box::new(SchemaType::Number(TypeOptions::new())),
            options: TypeOptions::new(),
        };
        let err = ty
            .validate(Some(&Value::Array(vec![Value::Text("nope".into())])))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn string_regex_query_op() {
        let ty = SchemaType::String(TypeOptions::new());
        let matched = ty
            .query_op("$regex", Some(&Value::Text("hello world".into())), &Value::Text("^hello".into()))
            .unwrap();
        assert!(matched);
        let unmatched = ty
            .query_op("$regex", Some(&Value::Text("goodbye".into())), &Value::Text("^hello".into()))
            .unwrap();
        assert!(!unmatched);
    }

    #[test]
    fn alias_exists_and_max_min() {
        let ty = SchemaType::Number(TypeOptions::new());
        assert!(ty
            .query_op("$exist", Some(&Value::Number(1.0)), &Value::Boolean(true))
            .unwrap());
        assert!(ty.query_op("$max", Some(&Value::Number(1.0)), &Value::Number(2.0)).unwrap());
        assert!(ty.query_op("$min", Some(&Value::Number(2.0)), &Value::Number(1.0)).unwrap());
    }

    #[test]
    fn unknown_operator_errors() {
        let ty = SchemaType::Number(TypeOptions::new());
        let err = ty.query_op("$frobnicate", None, &Value::Null).unwrap_err();
        assert!(matches!(err, OperatorError::UnknownQueryOperator { .. }));
    }
}
