//! Schema registry - entity metadata for rowmap
//!
//! This crate holds the declarative entity descriptors (tables, fields,
//! primary keys, relationships) and the registry that validates and
//! indexes them once at startup.

pub mod descriptor;
pub mod errors;
pub mod identifier;
pub mod key;
pub mod registry;
pub mod relationship;

pub use descriptor::{
    DefaultPolicy, EntityDefinition, EntityDescriptor, FieldDef, FieldDescriptor, TableName,
};
pub use errors::{SchemaError, UnknownEntityError};
pub use identifier::{IdentifierError, SqlIdentifier};
pub use key::{IdentityKey, KeyValue};
pub use registry::SchemaRegistry;
pub use relationship::{DeleteRule, Relationship, RelationshipKind};
