//! The shared operator tables every `SchemaType` dispatches through before
//! falling back to its own type-specific operators (§3, §4.B).
//!
//! A query operator table answers "does `value` satisfy `$op: query`?"; an
//! update operator table answers "what should happen to the path holding
//! `value` given `$op: update`?" — the latter's answer is an [`UpdateOutcome`]
//! rather than a bare replacement value, because `$rename` is the one
//! operator that doesn't just replace its own path (§4.B: "Rename is the one
//! exception: it writes a different path via the accessor").

use std::cmp::Ordering;

use crate::error::OperatorError;
use crate::types::schema_type::SchemaType;
use crate::value::Value;

/// What a successful update operator wants done to the document.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Replace the current path's value.
    SetTo(Value),
    /// Delete the current path's value.
    Delete,
    /// Move the current path's value to `target` (a dotted path), deleting
    /// the original.
    Rename(String),
}

/// Resolve query operator aliases (§4.B: "`$exists` ≡ `$exist`, `$max` ≡
/// `$lte`, `$min` ≡ `$gte`") to their canonical name.
pub fn canonical_query_op(op: &str) -> &str {
    match op {
        "$exist" => "$exists",
        "$max" => "$lte",
        "$min" => "$gte",
        other => other,
    }
}

/// The query operators every `SchemaType` shares, dispatched against
/// `compare`/`matches` rather than reimplemented per type. Returns `Ok(None)`
/// when `op` isn't one of these, so the caller can fall through to the
/// type's own table.
pub fn universal_query_op(
    ty: &SchemaType,
    op: &str,
    value: Option<&Value>,
    query: &Value,
) -> Result<Option<bool>, OperatorError> {
    let incompatible = |reason: &str| OperatorError::IncompatibleValue {
        type_name: ty.name().to_string(),
        op: op.to_string(),
        reason: reason.to_string(),
    };

    let result = match op {
        "$exists" => {
            let want = query.as_bool().unwrap_or(true);
            value.is_some() == want
        }
        "$eq" => value.map(|v| ty.compare(v, query) == Ordering::Equal).unwrap_or(false),
        "$ne" => !value.map(|v| ty.compare(v, query) == Ordering::Equal).unwrap_or(false),
        "$gt" => value.map(|v| ty.compare(v, query) == Ordering::Greater).unwrap_or(false),
        "$gte" => value
            .map(|v| ty.compare(v, query) != Ordering::Less)
            .unwrap_or(false),
        "$lt" => value.map(|v| ty.compare(v, query) == Ordering::Less).unwrap_or(false),
        "$lte" => value
            .map(|v| ty.compare(v, query) != Ordering::Greater)
            .unwrap_or(false),
        "$in" => {
            let candidates = query.as_array().ok_or_else(|| incompatible("$in expects an array"))?;
            value
                .map(|v| candidates.iter().any(|c| ty.compare(v, c) == Ordering::Equal))
                .unwrap_or(false)
        }
        "$nin" => {
            let candidates = query.as_array().ok_or_else(|| incompatible("$nin expects an array"))?;
            !value
                .map(|v| candidates.iter().any(|c| ty.compare(v, c) == Ordering::Equal))
                .unwrap_or(false)
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

/// The update operators every `SchemaType` shares (§4.E grammar: `$set`,
/// `$unset`, `$rename` apply uniformly regardless of the path's type).
pub fn universal_update_op(
    ty: &SchemaType,
    op: &str,
    update: &Value,
) -> Result<Option<UpdateOutcome>, OperatorError> {
    let outcome = match op {
        "$set" => UpdateOutcome::SetTo(update.clone()),
        "$unset" => UpdateOutcome::Delete,
        "$rename" => {
            let target = update.as_str().ok_or_else(|| OperatorError::IncompatibleValue {
                type_name: ty.name().to_string(),
                op: op.to_string(),
                reason: "$rename expects a string target path".to_string(),
            })?;
            UpdateOutcome::Rename(target.to_string())
        }
        _ => return Ok(None),
    };
    Ok(Some(outcome))
}
