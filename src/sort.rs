//! Component F: the sort compiler. Parses a sort document into a total
//! ordering over documents (§4.F).
//!
//! Input: a mapping from path to `1`/`"asc"`, `-1`/`"desc"`, or a nested
//! sort mapping. Compiles to a list of per-path directions, in declaration
//! order, combined lexicographically (first non-zero comparison wins).

use std::cmp::Ordering;

use tracing::{debug, instrument};

use crate::error::SortCompileError;
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortEntry {
    pub path: String,
    pub direction: SortDirection,
}

/// Compiles a sort document into an ordered list of comparators (§4.F, §6:
/// `_parseSort(s) -> [comparator]`).
#[instrument(skip(schema, sort_doc))]
pub fn compile(schema: &Schema, sort_doc: &Value) -> Result<Vec<SortEntry>, SortCompileError> {
    let obj = sort_doc.as_object().ok_or(SortCompileError::EmptyFieldPath)?;
    let mut entries = Vec::new();
    for (key, value) in obj {
        compile_entry(schema, "", key, value, &mut entries)?;
    }
    Ok(entries)
}

fn compile_entry(
    schema: &Schema,
    prefix: &str,
    key: &str,
    value: &Value,
    out: &mut Vec<SortEntry>,
) -> Result<(), SortCompileError> {
    if key.is_empty() {
        return Err(SortCompileError::EmptyFieldPath);
    }
    let full_path = Path::join(prefix, key);
    match value {
        Value::Number(n) => {
            let direction = if *n < 0.0 { SortDirection::Desc } else { SortDirection::Asc };
            out.push(SortEntry { path: full_path, direction });
            Ok(())
        }
        Value::Text(s) => match s.as_str() {
            "asc" => {
                out.push(SortEntry { path: full_path, direction: SortDirection::Asc });
                Ok(())
            }
            "desc" => {
                out.push(SortEntry { path: full_path, direction: SortDirection::Desc });
                Ok(())
            }
            other => Err(SortCompileError::InvalidDirection {
                path: full_path,
                reason: format!("'{other}' is not 'asc' or 'desc'"),
            }),
        },
        Value::Object(nested) => {
            for (subkey, subval) in nested {
                compile_entry(schema, &full_path, subkey, subval, out)?;
            }
            Ok(())
        }
        other => Err(SortCompileError::InvalidDirection {
            path: full_path,
            reason: format!("expected 1, -1, 'asc', 'desc', or a nested sort, got {other:?}"),
        }),
    }
}

/// A total preorder over documents (§8 property 6): antisymmetric and
/// transitive because each step is a total order on values of one type,
/// combined lexicographically.
pub fn compare(entries: &[SortEntry], schema: &Schema, a: &Value, b: &Value) -> Ordering {
    for entry in entries {
        let ty = type_for(schema, &entry.path);
        let av = path::get(a, &entry.path);
        let bv = path::get(b, &entry.path);
        let ord = match (av, bv) {
            (Some(x), Some(y)) => ty.compare(x, y),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        };
        let ord = if entry.direction == SortDirection::Desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
