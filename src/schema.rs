//! Component C: the schema compiler. Lowers a declarative schema tree into
//! `paths` (one `SchemaType` per dotted path) plus four insertion-ordered
//! stacks, and hosts the registries components H and I hang off of (hooks,
//! methods, statics, virtuals).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::instrument;

use crate::error::{SchemaError, ValidationError};
use crate::path::{self, Path};
use crate::types::{SchemaType, TypeOptions};
use crate::value::Value;

/// One accepted shape for a `path(name, decl)` declaration (§4.C). A direct
/// `SchemaType` covers the source's "SchemaType instance", "constructor
/// function", and "mapping with a `type` field" forms at once — in a typed
/// language those three forms exist only to recover a concrete type from a
/// dynamically-typed declaration, which Rust's enum already gives for free.
#[derive(Debug, Clone)]
pub enum PathDecl {
    Type(SchemaType),
    /// `[childDecl]`; `None` is the empty-sequence form, whose child is a
    /// bare `SchemaType` (§4.C: "or a bare SchemaType if empty").
    Array(Option<Box<PathDecl>>),
    /// A plain mapping without `type`: synthesizes an `Object` parent and
    /// recurses into its fields (§4.C, Invariant 2).
    Object(IndexMap<String, PathDecl>),
}

fn compile_inline(decl: PathDecl) -> SchemaType {
    match decl {
        PathDecl::Type(ty) => ty,
        PathDecl::Array(inner) => {
            let child = inner.map(|d| compile_inline(*d)).unwrap_or(SchemaType::Base);
            SchemaType::Array {
                child: Box::new(child),
                options: TypeOptions::new(),
            }
        }
        PathDecl::Object(_) => SchemaType::Object(TypeOptions::new()),
    }
}

/// The four insertion-ordered stacks (§3: "four ordered lists of per-path
/// closures"). Each entry is the path it was appended for when that path
/// was registered; applying a stack means walking it in order and invoking
/// the matching capability method (`cast`/`validate`/`parse`/`value`) on
/// `paths[entry]` — there is nothing type- or path-specific captured beyond
/// the name itself, so storing closures here would just be an indirection
/// around this generic dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stacks {
    pub getter: Vec<String>,
    pub setter: Vec<String>,
    pub import: Vec<String>,
    pub export: Vec<String>,
}

pub type VirtualGetter = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
pub type VirtualSetter = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// A computed field (component I): participates in the stacks but its
/// `export` closure always drops it (§3 Invariant 4).
#[derive(Clone, Default)]
pub struct VirtualField {
    pub getter: Option<VirtualGetter>,
    pub setter: Option<VirtualSetter>,
}

impl VirtualField {
    pub fn get<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(f));
        self
    }

    pub fn set<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for VirtualField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualField")
            .field("has_getter", &self.getter.is_some())
            .field("has_setter", &self.setter.is_some())
            .finish()
    }
}

/// `save`/`remove`, the only hook kinds §4.H accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Save,
    Remove,
}

impl HookKind {
    fn parse(raw: &str) -> Result<Self, SchemaError> {
        match raw {
            "save" => Ok(HookKind::Save),
            "remove" => Ok(HookKind::Remove),
            other => Err(SchemaError::UnknownHookKind(other.to_string())),
        }
    }
}

/// The uniform asynchronous contract every hook is wrapped to expose (§4.H,
/// §9 "Bluebird-style async hooks": "replace with a uniform result-returning
/// async type"). The engine only stores these; invocation is the collection
/// layer's job (§5).
pub type HookError = Box<dyn std::error::Error + Send + Sync>;
pub type HookFuture = Pin<Box<dyn Future<Output = Result<(), HookError>> + Send>>;
pub type HookFn = Arc<dyn Fn(Value) -> HookFuture + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    pub pre_save: Vec<HookFn>,
    pub post_save: Vec<HookFn>,
    pub pre_remove: Vec<HookFn>,
    pub post_remove: Vec<HookFn>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_save", &self.pre_save.len())
            .field("post_save", &self.post_save.len())
            .field("pre_remove", &self.pre_remove.len())
            .field("post_remove", &self.post_remove.len())
            .finish()
    }
}

pub type MethodFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
pub type StaticFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Mapping from Path to SchemaType, plus the stacks, hooks, and method
/// registries that hang off it (§3).
#[derive(Clone)]
pub struct Schema {
    pub paths: IndexMap<String, SchemaType>,
    pub stacks: Stacks,
    pub hooks: Hooks,
    pub methods: IndexMap<String, MethodFn>,
    pub statics: IndexMap<String, StaticFn>,
    pub virtuals: IndexMap<String, VirtualField>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("paths", &self.paths)
            .field("stacks", &self.stacks)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("statics", &self.statics.keys().collect::<Vec<_>>())
            .field("virtuals", &self.virtuals.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self {
            paths: IndexMap::new(),
            stacks: Stacks::default(),
            hooks: Hooks::default(),
            methods: IndexMap::new(),
            statics: IndexMap::new(),
            virtuals: IndexMap::new(),
        }
    }

    /// Installs every path of a declaration tree under `prefix`, in a single
    /// preorder pass (§9: "lower it to a flat `paths` map in a single
    /// preorder pass, materializing synthetic Object parents").
    #[instrument(skip(self, declaration))]
    pub fn add(&mut self, declaration: IndexMap<String, PathDecl>, prefix: &str) -> Result<(), SchemaError> {
        for (name, decl) in declaration {
            let full_name = Path::join(prefix, &name);
            self.path(&full_name, decl)?;
        }
        Ok(())
    }

    /// Installs a single typed path (§4.C).
    #[instrument(skip(self, decl))]
    pub fn path(&mut self, name: &str, decl: PathDecl) -> Result<(), SchemaError> {
        if name.is_empty() || name.split('.').any(str::is_empty) {
            return Err(SchemaError::InvalidPathDeclaration {
                path: name.to_string(),
                reason: "path must be a non-empty, dot-free-of-empty-segments identifier".to_string(),
            });
        }
        match decl {
            PathDecl::Type(ty) => self.install(name, ty),
            PathDecl::Array(inner) => {
                let child = inner.map(|d| compile_inline(*d)).unwrap_or(SchemaType::Base);
                self.install(
                    name,
                    SchemaType::Array {
                        child: Box::new(child),
                        options: TypeOptions::new(),
                    },
                )
            }
            PathDecl::Object(fields) => {
                self.install(name, SchemaType::Object(TypeOptions::new()))?;
                if !fields.is_empty() {
                    self.add(fields, name)?;
                }
                Ok(())
            }
        }
    }

    fn install(&mut self, name: &str, ty: SchemaType) -> Result<(), SchemaError> {
        if self.paths.contains_key(name) {
            return Err(SchemaError::DuplicatePath(name.to_string()));
        }
        self.paths.insert(name.to_string(), ty);
        self.stacks.getter.push(name.to_string());
        self.stacks.setter.push(name.to_string());
        self.stacks.import.push(name.to_string());
        self.stacks.export.push(name.to_string());
        Ok(())
    }

    /// Registers a virtual path and returns it so getter/setter may be
    /// chained (§4.I).
    pub fn virtual_field(&mut self, name: &str) -> Result<&mut VirtualField, SchemaError> {
        self.install(name, SchemaType::Virtual(TypeOptions::new()))?;
        self.virtuals.insert(name.to_string(), VirtualField::default());
        Ok(self.virtuals.get_mut(name).expect("just inserted"))
    }

    pub fn pre(&mut self, kind: &str, hook: HookFn) -> Result<(), SchemaError> {
        match HookKind::parse(kind)? {
            HookKind::Save => self.hooks.pre_save.push(hook),
            HookKind::Remove => self.hooks.pre_remove.push(hook),
        }
        Ok(())
    }

    pub fn post(&mut self, kind: &str, hook: HookFn) -> Result<(), SchemaError> {
        match HookKind::parse(kind)? {
            HookKind::Save => self.hooks.post_save.push(hook),
            HookKind::Remove => self.hooks.post_remove.push(hook),
        }
        Ok(())
    }

    pub fn method(&mut self, name: &str, f: MethodFn) -> Result<(), SchemaError> {
        if name.is_empty() {
            return Err(SchemaError::EmptyMethodName);
        }
        self.methods.insert(name.to_string(), f);
        Ok(())
    }

    /// Named `add_static` rather than `static` (a reserved word in Rust).
    pub fn add_static(&mut self, name: &str, f: StaticFn) -> Result<(), SchemaError> {
        if name.is_empty() {
            return Err(SchemaError::EmptyMethodName);
        }
        self.statics.insert(name.to_string(), f);
        Ok(())
    }

    /// Runs the getter stack: inflate a loaded document to its in-memory
    /// form (§4.C).
    pub fn apply_getters(&self, doc: &mut Value) {
        for name in &self.stacks.getter {
            let ty = &self.paths[name];
            let current = path::get(doc, name).cloned();
            if let Some(next) = ty.cast(current.as_ref()) {
                let _ = path::set(doc, name, next);
            }
        }
    }

    /// Runs the setter stack: canonicalize and validate before commit
    /// (§4.C, §7.2).
    pub fn apply_setters(&self, doc: &mut Value) -> Result<(), ValidationError> {
        for name in &self.stacks.setter {
            let ty = &self.paths[name];
            let current = path::get(doc, name).cloned();
            match ty.validate(current.as_ref())? {
                Some(next) => {
                    let _ = path::set(doc, name, next);
                }
                None => {
                    path::del(doc, name);
                }
            }
        }
        Ok(())
    }

    /// Runs the import stack: persisted JSON text form to runtime form
    /// (§4.C).
    pub fn parse_database(&self, mut doc: Value) -> Value {
        for name in &self.stacks.import {
            let ty = &self.paths[name];
            if let Some(current) = path::get(&doc, name).cloned() {
                let parsed = ty.parse(&current);
                let _ = path::set(&mut doc, name, parsed);
            }
        }
        doc
    }

    /// Runs the export stack: runtime form to JSON-safe persisted form;
    /// virtuals are dropped (§4.C, §3 Invariant 4).
    pub fn export_database(&self, mut doc: Value) -> Value {
        for name in &self.stacks.export {
            let ty = &self.paths[name];
            let current = path::get(&doc, name).cloned();
            match current.and_then(|c| ty.value(&c)) {
                Some(next) => {
                    let _ = path::set(&mut doc, name, next);
                }
                None => {
                    path::del(&mut doc, name);
                }
            }
        }
        doc
    }
}
