//! Error types for the rowmap crate
//!
//! The umbrella error the coordinator returns; component errors keep
//! their own types and convert upward.

use thiserror::Error;

use config::ConfigError;
use schema_registry::{SchemaError, UnknownEntityError};
use session::SessionError;

#[derive(Error, Debug)]
pub enum RowmapError {
    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntityError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Migration failed on '{statement}': {source}")]
    Migration {
        statement: String,
        #[source]
        source: sqlx::Error,
    },
}
