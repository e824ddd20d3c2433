//! Component D: the query compiler. Parses a query document into a
//! predicate over documents (§4.D).
//!
//! Grammar:
//! ```text
//! Query       ::= { (Clause | FieldQuery)* }
//! Clause      ::= "$and": [Query] | "$or": [Query] | "$nor": [Query]
//!               | "$not": Query    | "$where": <registered fn name>
//! FieldQuery  ::= key: (Value | NestedQuery | OperatorMap)
//! OperatorMap ::= { "$op": Value, ... }
//! NestedQuery ::= { subkey: ... }   -- recurses into dotted path
//! ```
//!
//! `$where` cannot carry a literal function in a data-only `Value`
//! document, unlike the dynamic-language source. Its value is instead a
//! string naming a function registered in a [`WhereRegistry`] passed
//! alongside the query document at compile time.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::error::QueryCompileError;
use crate::path::{self, Path};
use crate::schema::Schema;
use crate::types::SchemaType;
use crate::value::Value;

const BASE: SchemaType = SchemaType::Base;

fn type_for<'s>(schema: &'s Schema, path: &str) -> &'s SchemaType {
    schema.paths.get(path).unwrap_or_else(|| {
        debug!(path, "synthesizing base type for unknown path");
        &BASE
    })
}

pub type WhereFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Named `$where` functions a query document may reference by name (§4.D,
/// §9 "Bluebird-style async hooks" sibling note on functions-as-data).
#[derive(Clone, Default)]
pub struct WhereRegistry(IndexMap<String, WhereFn>);

impl WhereRegistry {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn register(&mut self, name: impl Into<String>, f: WhereFn) {
        self.0.insert(name.into(), f);
    }

    pub fn get(&self, name: &str) -> Option<&WhereFn> {
        self.0.get(name)
    }
}

/// A compiled query: AND-composed at the top (§4.D: "produce a stack of
/// predicates, AND-composed at the top").
#[derive(Clone)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Nor(Vec<Predicate>),
    Not(Box<Predicate>),
    Where(WhereFn),
    /// A `{ "$op": operand }` entry at `path`.
    FieldOp { path: String, op: String, operand: Value },
    /// A plain equality check at `path`.
    FieldEq { path: String, operand: Value },
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::And(ps) => f.debug_tuple("And").field(ps).finish(),
            Predicate::Or(ps) => f.debug_tuple("Or").field(ps).finish(),
            Predicate::Nor(ps) => f.debug_tuple("Nor").field(ps).finish(),
            Predicate::Not(p) => f.debug_tuple("Not").field(p).finish(),
            Predicate::Where(_) => write!(f, "Where(..)"),
            Predicate::FieldOp { path, op, operand } => {
                f.debug_struct("FieldOp").field("path", path).field("op", op).field("operand", operand).finish()
            }
            Predicate::FieldEq { path, operand } => {
                f.debug_struct("FieldEq").field("path", path).field("operand", operand).finish()
            }
        }
    }
}

impl Predicate {
    /// Evaluates against `doc`. Depends only on `(self, doc)` — query
    /// determinism (§8 property 4) — since `self` closes over the query
    /// document's literal values and `schema` is read-only at this point.
    pub fn eval(&self, schema: &Schema, doc: &Value) -> Result<bool, QueryCompileError> {
        match self {
            Predicate::And(ps) => {
                for p in ps {
                    if !p.eval(schema, doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(ps) => {
                for p in ps {
                    if p.eval(schema, doc)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Nor(ps) => {
                for p in ps {
                    if p.eval(schema, doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Not(p) => Ok(!p.eval(schema, doc)?),
            Predicate::Where(f) => Ok(f(doc)),
            Predicate::FieldOp { path: p, op, operand } => {
                let ty = type_for(schema, p);
                let value = path::get(doc, p);
                Ok(ty.query_op(op, value, operand)?)
            }
            Predicate::FieldEq { path: p, operand } => {
                let ty = type_for(schema, p);
                let value = path::get(doc, p);
                Ok(ty.matches(value, operand))
            }
        }
    }
}

/// Compiles a query document into a [`Predicate`] (§4.D, §6:
/// `_execQuery(q) -> predicate`).
#[instrument(skip(schema, query, wheres))]
pub fn compile(schema: &Schema, query: &Value, wheres: &WhereRegistry) -> Result<Predicate, QueryCompileError> {
    compile_query(schema, query, wheres)
}

fn compile_query(schema: &Schema, query: &Value, wheres: &WhereRegistry) -> Result<Predicate, QueryCompileError> {
    let obj = query.as_object().ok_or_else(|| QueryCompileError::InvalidClause {
        reason: "query must be an object".to_string(),
    })?;

    let mut predicates = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        predicates.push(compile_entry(schema, key, value, wheres)?);
    }
    Ok(Predicate::And(predicates))
}

fn compile_entry(
    schema: &Schema,
    key: &str,
    value: &Value,
    wheres: &WhereRegistry,
) -> Result<Predicate, QueryCompileError> {
    match key {
        "$and" => Ok(Predicate::And(compile_query_list(schema, value, wheres)?)),
        "$or" => Ok(Predicate::Or(compile_query_list(schema, value, wheres)?)),
        "$nor" => Ok(Predicate::Nor(compile_query_list(schema, value, wheres)?)),
        "$not" => Ok(Predicate::Not(Box::new(compile_query(schema, value, wheres)?))),
        "$where" => {
            let name = value.as_str().ok_or_else(|| QueryCompileError::InvalidClause {
                reason: "$where expects a registered function name".to_string(),
            })?;
            let f = wheres
                .get(name)
                .ok_or_else(|| QueryCompileError::InvalidClause {
                    reason: format!("no $where function registered as '{name}'"),
                })?
                .clone();
            Ok(Predicate::Where(f))
        }
        _ => compile_field(schema, "", key, value),
    }
}

fn compile_query_list(
    schema: &Schema,
    value: &Value,
    wheres: &WhereRegistry,
) -> Result<Vec<Predicate>, QueryCompileError> {
    let items = value.as_array().ok_or_else(|| QueryCompileError::InvalidClause {
        reason: "expected an array of queries".to_string(),
    })?;
    items.iter().map(|q| compile_query(schema, q, wheres)).collect()
}

fn compile_field(schema: &Schema, prefix: &str, key: &str, value: &Value) -> Result<Predicate, QueryCompileError> {
    if key.is_empty() {
        return Err(QueryCompileError::EmptyFieldPath);
    }
    let full_path = Path::join(prefix, key);
    match value.as_object() {
        Some(obj) => {
            let predicates = parse_normal_query(schema, &full_path, obj)?;
            Ok(Predicate::And(predicates))
        }
        None => Ok(Predicate::FieldEq {
            path: full_path,
            operand: value.clone(),
        }),
    }
}

/// Descends into an operator map / nested query at `prefix` (§4.D: "`$op`
/// keys invoke `q$op` on the SchemaType at the *current prefix*, and scalar
/// values become equality checks"). Joins with [`Path::join`], which never
/// emits a leading dot even when `prefix` is empty — the fix for the known
/// source bug (§9).
fn parse_normal_query(
    schema: &Schema,
    prefix: &str,
    obj: &BTreeMap<String, Value>,
) -> Result<Vec<Predicate>, QueryCompileError> {
    let mut predicates = Vec::with_capacity(obj.len());
    for (subkey, subval) in obj {
        if subkey.starts_with('$') {
            predicates.push(Predicate::FieldOp {
                path: prefix.to_string(),
                op: subkey.clone(),
                operand: subval.clone(),
            });
        } else if let Some(nested) = subval.as_object() {
            let joined = Path::join(prefix, subkey);
            predicates.extend(parse_normal_query(schema, &joined, nested)?);
        } else {
            let joined = Path::join(prefix, subkey);
            predicates.push(Predicate::FieldEq {
                path: joined,
                operand: subval.clone(),
            });
        }
    }
    Ok(predicates)
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

    fn age_name_schema() -> Schema {
        let mut schema = Schema::new();
        schema.path("age", PathDecl::Type(SchemaType::Number(TypeOptions::new()))).unwrap();
        let mut name_fields = IndexMap::new();
        name_fields.insert("first".to_string(), PathDecl::Type(SchemaType::String(TypeOptions::new())));
        name_fields.insert("last".to_string(), PathDecl::Type(SchemaType::String(TypeOptions::new())));
        schema.add(IndexMap::from([("name".to_string(), PathDecl::Object(name_fields))]), "").unwrap();
        schema
    }

    #[test]
    fn scenario_age_range_and_or_name() {
        let schema = age_name_schema();
        let wheres = WhereRegistry::new();
        let query = doc(json!({
            "age": {"$gte": 18, "$lt": 65},
            "$or": [{"name.first": "Jane"}, {"name.last": "Doe"}],
        }));
        let predicate = compile(&schema, &query, &wheres).unwrap();

        let matching = doc(json!({"age": 30, "name": {"first": "Jane", "last": "Smith"}}));
        assert!(predicate.eval(&schema, &matching).unwrap());

        let non_matching = doc(json!({"age": 70, "name": {"first": "Jane", "last": "Smith"}}));
        assert!(!predicate.eval(&schema, &non_matching).unwrap());
    }

    #[test]
    fn nested_path_join_has_no_leading_dot() {
        let schema = age_name_schema();
        let wheres = WhereRegistry::new();
        let query = doc(json!({"name": {"first": {"$eq": "Jane"}}}));
        let predicate = compile(&schema, &query, &wheres).unwrap();
        match predicate {
            Predicate::And(ps) => match &ps[0] {
                Predicate::And(inner) => match &inner[0] {
                    Predicate::FieldOp { path, .. } => assert_eq!(path, "name.first"),
                    other => panic!("unexpected predicate: {other:?}"),
                },
                other => panic!("unexpected predicate: {other:?}"),
            },
            other => panic!("unexpected predicate: {other:?}"),
        }
    }

    #[test]
    fn or_nor_duality() {
        let schema = age_name_schema();
        let wheres = WhereRegistry::new();
        let or_query = doc(json!({"$or": [{"age": 1}, {"age": 2}]}));
        let nor_query = doc(json!({"$nor": [{"age": 1}, {"age": 2}]}));
        let or_pred = compile(&schema, &or_query, &wheres).unwrap();
        let nor_pred = compile(&schema, &nor_query, &wheres).unwrap();

        for age in [1.0, 2.0, 3.0] {
            let d = doc(json!({"age": age}));
            let or_result = or_pred.eval(&schema, &d).unwrap();
            let nor_result = nor_pred.eval(&schema, &d).unwrap();
            assert_eq!(or_result, !nor_result);
        }
    }

    #[test]
    fn not_equals_negated_equality() {
        let schema = age_name_schema();
        let wheres = WhereRegistry::new();
        let not_query = doc(json!({"$not": {"age": 1}}));
        let predicate = compile(&schema, &not_query, &wheres).unwrap();

        assert!(!predicate.eval(&schema, &doc(json!({"age": 1}))).unwrap());
        assert!(predicate.eval(&schema, &doc(json!({"age": 2}))).unwrap());
    }

    #[test]
    fn unknown_path_synthesizes_base_type() {
        let schema = age_name_schema();
        let wheres = WhereRegistry::new();
        let query = doc(json!({"nickname": "Janey"}));
        let predicate = compile(&schema, &query, &wheres).unwrap();
        assert!(predicate.eval(&schema, &doc(json!({"nickname": "Janey"}))).unwrap());
        assert!(!predicate.eval(&schema, &doc(json!({"nickname": "Other"}))).unwrap());
    }

    #[test]
    fn where_dispatches_to_registered_function() {
        let schema = age_name_schema();
        let mut wheres = WhereRegistry::new();
        wheres.register("adult", Arc::new(|doc: &Value| path::get(doc, "age").and_then(Value::as_f64).unwrap_or(0.0) >= 18.0));
        let query = doc(json!({"$where": "adult"}));
        let predicate = compile(&schema, &query, &wheres).unwrap();
        assert!(predicate.eval(&schema, &doc(json!({"age": 20}))).unwrap());
        assert!(!predicate.eval(&schema, &doc(json!({"age": 10}))).unwrap());
    }

    #[test]
    fn determinism() {
        let schema = age_name_schema();
        let wheres = WhereRegistry::new();
        let query = doc(json!({"age": {"$gte": 18}}));
        let predicate = compile(&schema, &query, &wheres).unwrap();
        let d = doc(json!({"age": 30}));
        let first = predicate.eval(&schema, &d).unwrap();
        let second = predicate.eval(&schema, &d).unwrap();
        assert_eq!(first, second);
    }
}
