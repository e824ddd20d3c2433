use std::cmp::Ordering;
use std::fmt;

use crate::error::{OperatorError, ValidationError};
use crate::value::{loose_compare, Value};

/// Escape hatch for schema path declarations whose constructor is supplied
/// directly by the caller, rather than one of the built-in tag names (§4.B:
/// "User-defined types are constructors supplied directly in the schema
/// declaration").
///
/// Default method bodies fall back to loose equality/comparison and reject
/// every named operator, so a minimal custom type only needs to implement
/// `name`, `cast`, and `validate`.
pub trait CustomSchemaType: Send + Sync {
    fn name(&self) -> &str;

    fn is_required(&self) -> bool {
        false
    }

    fn default_value(&self) -> Option<Value> {
        None
    }

    /// Ingress transform; `null`/absent substitutes the default (§3).
    fn cast(&self, value: Option<&Value>) -> Option<Value> {
        value.cloned().or_else(|| self.default_value())
    }

    /// Egress transform before persistence; enforces `required`. An
    /// explicitly present `Value::Null` is treated the same as an absent
    /// value, matching `cast`'s null/absent-substitutes-default treatment.
    fn validate(&self, value: Option<&Value>) -> Result<Option<Value>, ValidationError> {
        let is_null_or_absent = matches!(value, None | Some(Value::Null));
        if is_null_or_absent && self.is_required() {
            return Err(ValidationError::RequiredFieldMissing {
                path: self.name().to_string(),
            });
        }
        Ok(value.cloned())
    }

    fn parse(&self, value: &Value) -> Value {
        value.clone()
    }

    fn value(&self, value: &Value) -> Option<Value> {
        Some(value.clone())
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        loose_compare(a, b)
    }

    fn matches(&self, value: Option<&Value>, query: &Value) -> bool {
        value.map(|v| self.compare(v, query) == Ordering::Equal).unwrap_or(false)
    }

    fn query_op(&self, op: &str, _value: Option<&Value>, _query: &Value) -> Result<bool, OperatorError> {
        Err(OperatorError::UnknownQueryOperator {
            type_name: self.name().to_string(),
            op: op.to_string(),
        })
    }

    fn update_op(
        &self,
        op: &str,
        _value: Option<&Value>,
        _update: &Value,
    ) -> Result<Option<Value>, OperatorError> {
        Err(OperatorError::UnknownUpdateOperator {
            type_name: self.name().to_string(),
            op: op.to_string(),
        })
    }
}

impl fmt::Debug for dyn CustomSchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CustomSchemaType({})", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Upper;

    impl CustomSchemaType for Upper {
        fn name(&self) -> &str {
            "Upper"
        }

        fn cast(&self, value: Option<&Value>) -> Option<Value> {
            match value {
                Some(Value::Text(s)) => Some(Value::Text(s.to_uppercase())),
                other => other.cloned(),
            }
        }

        fn validate(&self, value: Option<&Value>) -> Result<Option<Value>, ValidationError> {
            Ok(value.cloned())
        }
    }

    #[test]
    fn custom_type_default_methods() {
        let upper = Upper;
        assert_eq!(
            upper.cast(Some(&Value::Text("ok".into()))),
            Some(Value::Text("OK".into()))
        );
        assert!(upper.query_op("$foo", None, &Value::Null).is_err());
    }
}
