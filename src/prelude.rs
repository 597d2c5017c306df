//! Convenience re-exports for common rowmap usage

// Coordinator and errors
pub use crate::errors::RowmapError;
pub use crate::Rowmap;

// Configuration
pub use config::{AppConfig, ConfigError, DatabaseConfig};

// Schema declaration
pub use schema_registry::{
    DeleteRule, EntityDefinition, FieldDef, IdentityKey, KeyValue, Relationship, SchemaError,
    SchemaRegistry, UnknownEntityError,
};

// Values and column types
pub use type_coercion::{ColumnType, PgValue};

// Query building
pub use query_builder::{
    Filter, NullsPlacement, OrderBy, QueryExpression, SortOrder, UnsupportedQueryError,
};

// Sessions and instances
pub use session::{
    ConstraintKind, EntityQuery, HydrationError, InstanceRef, Page, Savepoint, Session,
    SessionError, SessionState,
};

// Common external dependencies that are frequently used
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
