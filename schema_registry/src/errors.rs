use thiserror::Error;

use crate::identifier::IdentifierError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("entity '{entity}' has no primary key field")]
    MissingPrimaryKey { entity: String },

    #[error("entity '{entity}' primary key field '{field}' has type {column_type} which cannot be used as a key")]
    UnkeyablePrimaryKey {
        entity: String,
        field: String,
        column_type: String,
    },

    #[error("entity '{entity}' primary key field '{field}' must not be nullable")]
    NullablePrimaryKey { entity: String, field: String },

    #[error("entity '{entity}' declares no fields")]
    NoFields { entity: String },

    #[error("entity '{entity}' declares field '{field}' more than once")]
    DuplicateField { entity: String, field: String },

    #[error("entity '{entity}' declares relationship '{relationship}' more than once")]
    DuplicateRelationship {
        entity: String,
        relationship: String,
    },

    #[error("entity name '{entity}' is already registered with a different definition")]
    ConflictingRedefinition { entity: String },

    #[error("table '{table}' is already mapped by entity '{entity}'")]
    DuplicateTable { table: String, entity: String },

    #[error("entity '{entity}' relationship '{relationship}' targets unknown entity '{target}'")]
    UnknownRelationshipTarget {
        entity: String,
        relationship: String,
        target: String,
    },

    #[error("entity '{entity}' relationship '{relationship}' refers to unknown field '{field}'")]
    UnknownRelationshipField {
        entity: String,
        relationship: String,
        field: String,
    },

    #[error("entity '{entity}' relationship '{relationship}' requires target '{target}' to have a single-column primary key")]
    CompositeKeyRelationship {
        entity: String,
        relationship: String,
        target: String,
    },

    #[error("circular foreign-key reference involving entities: {entities}")]
    CircularReference { entities: String },

    #[error("registry is finalized; entities can no longer be registered")]
    Finalized,

    #[error("registry must be finalized before this operation")]
    NotFinalized,
}

/// Lookup miss against the registry.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown entity '{0}'")]
pub struct UnknownEntityError(pub String);
