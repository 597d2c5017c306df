use thiserror::Error;

use schema_registry::{IdentifierError, UnknownEntityError};

/// Raised when an expression shape cannot be compiled. Detection is
/// complete before any statement reaches the database.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnsupportedQueryError {
    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntityError),

    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierError),

    #[error("alias '{alias}' does not name a table in this query")]
    UnknownAlias { alias: String },

    #[error("alias '{alias}' is declared twice in this query")]
    DuplicateAlias { alias: String },

    #[error("column '{column}' does not exist on '{alias}'")]
    UnknownColumn { alias: String, column: String },

    #[error("entity '{entity}' has no relationship named '{relationship}'")]
    UnknownRelationship {
        entity: String,
        relationship: String,
    },

    #[error("update of '{entity}' has no changed columns")]
    EmptyUpdate { entity: String },

    #[error("key for '{entity}' spans {actual} columns, expected {expected}")]
    KeyWidthMismatch {
        entity: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot select by an empty key list for '{entity}'")]
    EmptyKeyList { entity: String },
}
