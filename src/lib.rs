//! # warehouse-schema
//!
//! Schema-driven compiler for an in-memory JSON document warehouse.
//!
//! A [`schema::Schema`] lowers a declarative tree of paths into a flat
//! `paths` map plus four insertion-ordered stacks (getter, setter, import,
//! export) that drive document lifecycle transitions. Three small DSLs
//! compile against that schema:
//!
//! - [`query`] — a MongoDB-style filter document compiles to a [`query::Predicate`]
//! - [`update`] — a MongoDB-style update document compiles to a [`update::Mutator`] stack
//! - [`sort`] — a sort document compiles to an ordered list of comparators
//!
//! [`populate`] normalizes reference-field population descriptors; actually
//! resolving those references against another collection is outside this
//! crate (that's a collection/driver concern, not a schema concern).
//!
//! [`path`] provides the dotted-path get/set/del primitives everything else
//! is built on, and [`value::Value`] is the document representation: JSON
//! plus the two host types (`DateTime`, `Buffer`) a schema can introduce at
//! a path.

pub mod error;
pub mod path;
pub mod populate;
pub mod query;
pub mod schema;
pub mod sort;
pub mod types;
pub mod update;
pub mod value;

pub use error::{
    OperatorError, PopulationError, QueryCompileError, SchemaError, SortCompileError,
    UpdateCompileError, ValidationError,
};
pub use path::Path;
pub use populate::{parse as parse_populate, PopulateDescriptor};
pub use query::{compile as compile_query, Predicate, WhereRegistry};
pub use schema::{HookKind, PathDecl, Schema, VirtualField};
pub use sort::{compare as compare_sorted, compile as compile_sort, SortDirection, SortEntry};
pub use types::{CustomSchemaType, DefaultValue, DocumentId, SchemaType, TypeOptions, UpdateOutcome};
pub use update::{apply as apply_update, compile as compile_update, Mutator};
pub use value::Value;
