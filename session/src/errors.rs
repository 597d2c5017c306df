use thiserror::Error;

use query_builder::UnsupportedQueryError;
use schema_registry::{SchemaError, UnknownEntityError};
use type_coercion::CoercionError;

/// Which class of database constraint was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
    NotNull,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::Check => "check",
            ConstraintKind::NotNull => "not null",
        };
        write!(f, "{}", name)
    }
}

/// Row-to-instance (or back) conversion failures.
#[derive(Error, Debug)]
pub enum HydrationError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("row is missing column '{column}'")]
    MissingColumn { column: String },

    #[error("row has {actual} columns where {expected} were declared")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("instance of '{entity}' carries unknown field '{field}'")]
    UnknownField { entity: String, field: String },

    #[error("field '{field}' of '{entity}' holds a {found} value, declared as {expected}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        found: &'static str,
    },

    #[error("column '{column}' has SQL type {sql_type} which rowmap cannot decode")]
    UnsupportedSqlType { column: String, sql_type: String },
}

/// Errors surfaced by session operations. Execution errors always
/// arrive after the enclosing transaction has been rolled back.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no database connection became available within the acquire timeout")]
    PoolExhausted,

    #[error("statement execution exceeded the configured timeout")]
    StatementTimeout,

    #[error("{kind} constraint violated (constraint: {constraint:?}, table: {table:?}, code: {code})")]
    ConstraintViolation {
        kind: ConstraintKind,
        constraint: Option<String>,
        table: Option<String>,
        code: String,
    },

    #[error(transparent)]
    Hydration(#[from] HydrationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    UnknownEntity(#[from] UnknownEntityError),

    #[error(transparent)]
    Query(#[from] UnsupportedQueryError),

    #[error("session is closed; it has already been committed or rolled back")]
    Closed,

    #[error("instance of '{entity}' has no primary key value and cannot be addressed")]
    MissingPrimaryKey { entity: String },

    #[error("instance of '{entity}' is not tracked by this session")]
    DetachedInstance { entity: String },

    #[error("raw statement references parameter ':{name}' which was not provided")]
    UnknownParameter { name: String },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}
