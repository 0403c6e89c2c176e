//! Entity metamodel.
//!
//! Entity types are declared as [`EntityDef`]s (in code, through the [`Model`] trait, or
//! from a JSON schema document) and collected in a [`ModelRegistry`]. Every attribute is
//! either a scalar column ([`FieldDef`]) or a reference to another entity ([`RelationDef`]).

mod entity;
mod field;
mod registry;
mod relation;
mod types;

pub use entity::{
    Attribute, AttributeOption, EntityDef, Model, Presentation, TranslateValues, DEFAULT_IDENTITY,
};
pub use field::{DefaultValue, FieldDef};
pub use registry::ModelRegistry;
pub use relation::RelationDef;
pub use types::ScalarType;
