//! Component G: the population descriptor parser. Normalizes a populate
//! expression into an ordered list of resolved `{path, model}` references
//! (§4.G). Resolution of those references against another collection is
//! outside the engine's scope (§1 Non-goals); this module only parses.

use tracing::instrument;

use crate::error::PopulationError;
use crate::schema::Schema;
use crate::types::SchemaType;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateDescriptor {
    pub path: String,
    pub model: String,
}

/// Input accepted by [`parse`]: a space-separated path list, a list of bare
/// path strings, a list of option mappings, or a single mapping (§4.G).
#[instrument(skip(schema, expr))]
pub fn parse(schema: &Schema, expr: &Value) -> Result<Vec<PopulateDescriptor>, PopulationError> {
    match expr {
        Value::Text(s) => s
            .split_whitespace()
            .map(|path| resolve(schema, path, None))
            .collect(),
        Value::Array(items) => items.iter().map(|item| parse_item(schema, item)).collect(),
        Value::Object(_) => Ok(vec![parse_item(schema, expr)?]),
        _ => Err(PopulationError::PathRequired),
    }
}

fn parse_item(schema: &Schema, item: &Value) -> Result<PopulateDescriptor, PopulationError> {
    match item {
        Value::Text(s) => resolve(schema, s, None),
        Value::Object(obj) => {
            let path = obj
                .get("path")
                .and_then(Value::as_str)
                .ok_or(PopulationError::PathRequired)?;
            let model = obj.get("model").and_then(Value::as_str);
            resolve(schema, path, model)
        }
        _ => Err(PopulationError::PathRequired),
    }
}

fn resolve(schema: &Schema, path: &str, model: Option<&str>) -> Result<PopulateDescriptor, PopulationError> {
    if path.is_empty() {
        return Err(PopulationError::PathRequired);
    }
    if let Some(m) = model {
        return Ok(PopulateDescriptor {
            path: path.to_string(),
            model: m.to_string(),
        });
    }
    let ref_model = schema.paths.get(path).and_then(|ty| match ty {
        SchemaType::Array { child, .. } => child.options().and_then(|o| o.ref_model.clone()),
        other => other.options().and_then(|o| o.ref_model.clone()),
    });
    ref_model
        .map(|model| PopulateDescriptor {
            path: path.to_string(),
            model,
        })
        .ok_or_else(|| PopulationError::ModelRequired { path: path.to_string() })
}
