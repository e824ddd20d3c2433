use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// A `SchemaType`'s default, either a fixed `Value` or a function invoked
/// fresh on every substitution (§3: `default: Value | () -> Value`; §8
/// property 2: "calling a function default each time").
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Computed(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Computed(f) => f(),
        }
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        DefaultValue::Value(value.into())
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        DefaultValue::Computed(Arc::new(f))
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => write!(f, "DefaultValue::Value({v:?})"),
            DefaultValue::Computed(_) => write!(f, "DefaultValue::Computed(..)"),
        }
    }
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DefaultValue::Value(a), DefaultValue::Value(b)) => a == b,
            // Two computed defaults are never considered equal: they may
            // close over independent state and are only ever compared in
            // tests, never at runtime.
            _ => false,
        }
    }
}

/// The options every `SchemaType` carries, per §3: "an options mapping (at
/// minimum `required: bool`, `default: Value | () -> Value`)". `ref_model`
/// is the `ref` option §4.G's population parser reads off `Id`/`Array`
/// paths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeOptions {
    pub required: bool,
    pub default: Option<DefaultValue>,
    pub ref_model: Option<String>,
}

impl TypeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_ref(mut self, model: impl Into<String>) -> Self {
        self.ref_model = Some(model.into());
        self
    }
}
