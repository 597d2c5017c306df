//! # rowmap
//!
//! A PostgreSQL object-relational mapper: declare entities against a
//! schema registry, query through typed expressions compiled to
//! parameterized SQL, and persist through sessions that batch pending
//! changes into one atomic flush.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rowmap::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), RowmapError> {
//!     let mut registry = SchemaRegistry::new();
//!     registry.register(
//!         EntityDefinition::new("user", "users")
//!             .field(FieldDef::new("id", ColumnType::Integer).primary_key())
//!             .field(FieldDef::new("email", ColumnType::Text).unique()),
//!     )?;
//!
//!     let config = DatabaseConfig::new(
//!         "localhost".to_string(), 5432, "rowmap".to_string(),
//!         "postgres".to_string(), "password".to_string(),
//!         1, 5, 30, 600, 3600,
//!     );
//!
//!     let rowmap = Rowmap::connect(config, registry).await?;
//!     rowmap.apply_migrations().await?;
//!
//!     let mut session = rowmap.session().await?;
//!     let user = InstanceRef::new("user");
//!     user.set("id", 1).set("email", "john@example.com");
//!     session.add(user)?;
//!     session.commit().await?;
//!
//!     let mut session = rowmap.session().await?;
//!     let found = session.get("user", 1).await?;
//!     println!("loaded: {:?}", found.and_then(|u| u.get("email")));
//!
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod migration;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::Rowmap;
pub use errors::RowmapError;

// Re-export centralized config
pub use config::{AppConfig, ConfigError, DatabaseConfig};

// Re-export the member crates behind the public API
pub use query_builder;
pub use schema_registry;
pub use session;
pub use type_coercion;

// Re-export external dependencies used in public API
pub use sqlx;
