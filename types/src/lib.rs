//! Momentum Types - shared configuration and type-mapping primitives
//!
//! This crate holds the inputs the migration engine consumes:
//! - [`Dialect`] - the supported SQL dialects
//! - [`Collection`] and [`Field`] - the declarative collection configuration
//! - [`column_types`] - field-to-SQL type mapping and normalization
//!
//! The engine itself lives in `momentum-migrations`; this crate stays free of
//! database drivers so collection configs can be (de)serialized anywhere.

pub mod collection;
pub mod column_types;
pub mod dialect;
pub mod field;

pub use collection::{Collection, CollectionIndex, SoftDeleteConfig, VersionsConfig};
pub use column_types::{are_types_compatible, normalize_type, sql_type_for_field};
pub use dialect::{Dialect, DialectParseError};
pub use field::{
    ContainerField, DataField, Field, FieldKind, FlattenedField, GroupField, OnDeleteRule,
    RelationTarget, RelationshipField, SelectField, Tab, TabsField, flatten_fields,
};
