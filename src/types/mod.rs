//! Built-in field types (component B): the polymorphic `SchemaType`
//! descriptor, its options, the user-extensibility escape hatch, and the
//! shared operator tables every type dispatches through.

pub mod custom;
pub mod id;
pub mod operators;
pub mod options;
pub mod schema_type;

pub use custom::CustomSchemaType;
pub use id::DocumentId;
pub use operators::UpdateOutcome;
pub use options::{DefaultValue, TypeOptions};
pub use schema_type::SchemaType;
