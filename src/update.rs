//! Component E: the update compiler. Parses an update document into a
//! sequence of mutating actions over a document (§4.E).
//!
//! Grammar:
//! ```text
//! Update ::= { Action* }
//! Action ::= "$op": { field: value, ... }   -- inline form
//!         |  key: { "$op": value, ... }     -- first-class form on path
//!         |  key: NestedUpdate | Value
//! ```
//!
//! The source's inline-form bug — iterating `fields[j]` but indexing with
//! the outer loop variable `i` — has no analogue here: direct
//! `(field, value)` iteration over the map never carries a second index to
//! confuse with the first (§9 known bug, fixed by construction).

use tracing::{debug, instrument};

use crate::error::UpdateCompileError;
use crate::path::{self, Path};
use crate::schema::Schema;
use crate::types::{SchemaType, UpdateOutcome};
use crate::value::Value;

const BASE: SchemaType = SchemaType::Base;

fn type_for<'s>(schema: &'s Schema, path: &str) -> &'s SchemaType {
    schema.paths.get(path).unwrap_or_else(|| {
        debug!(path, "synthesizing base type for unknown path");
        &BASE
    })
}

/// One compiled mutating action (§4.E: "a stack of mutating closures
/// `(doc) -> void`").
#[derive(Debug, Clone, PartialEq)]
pub enum Mutator {
    /// Plain assignment: `set(doc, path, value)`.
    Assign { path: String, value: Value },
    /// Invoke `u$op` on `path`'s `SchemaType`.
    Apply { path: String, op: String, operand: Value },
}

/// Compiles an update document into a mutator stack (§4.E, §6:
/// `_parseUpdate(u) -> [mutator]`).
#[instrument(skip(schema, update))]
pub fn compile(schema: &Schema, update: &Value) -> Result<Vec<Mutator>, UpdateCompileError> {
    let obj = update.as_object().ok_or_else(|| UpdateCompileError::InvalidClause {
        reason: "update must be an object".to_string(),
    })?;
    let mut mutators = Vec::new();
    for (key, value) in obj {
        compile_entry(schema, "", key, value, &mut mutators)?;
    }
    Ok(mutators)
}

fn compile_entry(
    schema: &Schema,
    prefix: &str,
    key: &str,
    value: &Value,
    out: &mut Vec<Mutator>,
) -> Result<(), UpdateCompileError> {
    if key.is_empty() {
        return Err(UpdateCompileError::EmptyFieldPath);
    }

    if key.starts_with('$') {
        if prefix.is_empty() {
            // Inline form: "$op": { field: value, ... }.
            let fields = value.as_object().ok_or_else(|| UpdateCompileError::InvalidClause {
                reason: format!("'{key}' expects an object mapping fields to operands"),
            })?;
            for (field, operand) in fields {
                out.push(Mutator::Apply {
                    path: field.clone(),
                    op: key.to_string(),
                    operand: operand.clone(),
                });
            }
        } else {
            // First-class form reached via recursion: the prefix itself is
            // the target path.
            out.push(Mutator::Apply {
                path: prefix.to_string(),
                op: key.to_string(),
                operand: value.clone(),
            });
        }
        return Ok(());
    }

    let full_path = Path::join(prefix, key);
    match value.as_object() {
        Some(obj) if obj.keys().any(|k| k.starts_with('$')) => {
            // First-class form: key: { "$op": value, ... }.
            for (op, operand) in obj {
                if !op.starts_with('$') {
                    return Err(UpdateCompileError::InvalidClause {
                        reason: format!("cannot mix operators and plain fields under `{full_path}`"),
                    });
                }
                out.push(Mutator::Apply {
                    path: full_path.clone(),
                    op: op.clone(),
                    operand: operand.clone(),
                });
            }
            Ok(())
        }
        Some(obj) => {
            // NestedUpdate: recurse with prefix + key + '.'.
            for (subkey, subval) in obj {
                compile_entry(schema, &full_path, subkey, subval, out)?;
            }
            Ok(())
        }
        None => {
            out.push(Mutator::Assign {
                path: full_path,
                value: value.clone(),
            });
            Ok(())
        }
    }
}

/// Applies a compiled mutator stack to `doc`, in order (§5: "stack
/// execution is strictly insertion order").
pub fn apply(mutators: &[Mutator], schema: &Schema, doc: &mut Value) -> Result<(), UpdateCompileError> {
    for mutator in mutators {
        match mutator {
            Mutator::Assign { path: p, value } => {
                path::set(doc, p, value.clone())?;
            }
            Mutator::Apply { path: p, op, operand } => {
                let ty = type_for(schema, p);
                let current = path::get(doc, p).cloned();
                let outcome = ty.update_op(op, current.as_ref(), operand)?;
                match outcome {
                    UpdateOutcome::SetTo(v) => {
                        path::set(doc, p, v)?;
                    }
                    UpdateOutcome::Delete => {
                        path::del(doc, p);
                    }
                    UpdateOutcome::Rename(target) => {
                        if let Some(v) = path::del(doc, p) {
                            path::set(doc, &target, v)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PathDecl;
    use crate::types::TypeOptions;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Value {
        v.into()
    }

    fn counters_schema() -> Schema {
        let mut schema = Schema::new();
        schema.path("age", PathDecl::Type(SchemaType::Number(TypeOptions::new()))).unwrap();
        schema.path("visits", PathDecl::Type(SchemaType::Number(TypeOptions::new()))).unwrap();
        schema
    }

    #[test]
    fn scenario_set_and_inc() {
        let schema = counters_schema();
        let update = doc(json!({"$set": {"age": 31}, "$inc": {"visits": 1}}));
        let mutators = compile(&schema, &update).unwrap();
        let mut d = doc(json!({"age": 30, "visits": 5}));
        apply(&mutators, &schema, &mut d).unwrap();
        assert_eq!(d, doc(json!({"age": 31.0, "visits": 6.0})));
    }

    #[test]
    fn set_is_idempotent() {
        let schema = counters_schema();
        let update = doc(json!({"$set": {"age": 31}}));
        let mutators = compile(&schema, &update).unwrap();
        let mut d = doc(json!({"age": 30}));
        apply(&mutators, &schema, &mut d).unwrap();
        apply(&mutators, &schema, &mut d).unwrap();
        assert_eq!(d, doc(json!({"age": 31.0})));
    }

    #[test]
    fn unset_is_idempotent() {
        let schema = counters_schema();
        let update = doc(json!({"$unset": {"age": true}}));
        let mutators = compile(&schema, &update).unwrap();
        let mut d = doc(json!({"age": 30}));
        apply(&mutators, &schema, &mut d).unwrap();
        apply(&mutators, &schema, &mut d).unwrap();
        assert_eq!(path::get(&d, "age"), None);
    }

    #[test]
    fn rename_moves_value_once() {
        let schema = counters_schema();
        let update = doc(json!({"age": {"$rename": "years"}}));
        let mutators = compile(&schema, &update).unwrap();
        let mut d = doc(json!({"age": 30}));
        apply(&mutators, &schema, &mut d).unwrap();
        assert_eq!(path::get(&d, "age"), None);
        assert_eq!(path::get(&d, "years"), Some(&Value::Number(30.0)));

        // Applying again is a no-op: "age" is already gone.
        apply(&mutators, &schema, &mut d).unwrap();
        assert_eq!(path::get(&d, "years"), Some(&Value::Number(30.0)));
    }

    #[test]
    fn nested_update_assigns_subfields() {
        let mut schema = Schema::new();
        let mut name_fields = indexmap::IndexMap::new();
        name_fields.insert("first".to_string(), PathDecl::Type(SchemaType::String(TypeOptions::new())));
        schema
            .add(indexmap::IndexMap::from([("name".to_string(), PathDecl::Object(name_fields))]), "")
            .unwrap();
        let update = doc(json!({"name": {"first": "Jane"}}));
        let mutators = compile(&schema, &update).unwrap();
        let mut d = doc(json!({}));
        apply(&mutators, &schema, &mut d).unwrap();
        assert_eq!(path::get(&d, "name.first"), Some(&Value::Text("Jane".into())));
    }

    #[test]
    fn mixing_operators_and_plain_fields_errors() {
        let schema = counters_schema();
        let update = doc(json!({"age": {"$inc": 1, "plain": 2}}));
        let err = compile(&schema, &update).unwrap_err();
        assert!(matches!(err, UpdateCompileError::InvalidClause { .. }));
    }
}
