//! Core rowmap functionality
//!
//! This module contains the main `Rowmap` coordinator: it owns the
//! connection pool and the finalized schema registry, and opens
//! sessions for units of work.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use config::DatabaseConfig;
use schema_registry::SchemaRegistry;
use session::Session;

use crate::errors::RowmapError;

/// Coordinator owning the pool and the registry. Clone-cheap handles
/// are not provided; share it behind an `Arc` if needed.
pub struct Rowmap {
    pool: PgPool,
    registry: Arc<SchemaRegistry>,
}

impl Rowmap {
    /// Finalize the registry, build the pool from config, and connect.
    ///
    /// The connection URI is assembled by the config layer and handed
    /// to sqlx; rowmap itself never parses it. A non-zero
    /// `statement_timeout_seconds` is applied to every pooled
    /// connection so statement execution is bounded.
    pub async fn connect(
        config: DatabaseConfig,
        mut registry: SchemaRegistry,
    ) -> Result<Self, RowmapError> {
        registry.finalize()?;

        let connection_string = config.connection_string();

        let mut pool_options = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

        // Set max lifetime if specified
        if config.max_lifetime_seconds > 0 {
            pool_options =
                pool_options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
        }

        if config.statement_timeout_seconds > 0 {
            let timeout_ms = config.statement_timeout_seconds * 1000;
            pool_options = pool_options.after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::Executor::execute(
                        conn,
                        format!("SET statement_timeout = {}", timeout_ms).as_str(),
                    )
                    .await?;
                    Ok(())
                })
            });
        }

        let pool = pool_options.connect(&connection_string).await?;
        tracing::info!(
            entities = registry.len(),
            max_connections = config.max_connections,
            "rowmap connected"
        );

        Ok(Self {
            pool,
            registry: Arc::new(registry),
        })
    }

    /// Build from an already-established pool (tests, embedding).
    /// The registry is finalized here if the caller has not done so.
    pub fn from_pool(pool: PgPool, mut registry: SchemaRegistry) -> Result<Self, RowmapError> {
        registry.finalize()?;
        Ok(Self {
            pool,
            registry: Arc::new(registry),
        })
    }

    /// Get database pool reference
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// The finalized schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Open a session: one transaction, one identity map, one unit of
    /// work.
    pub async fn session(&self) -> Result<Session, RowmapError> {
        Ok(Session::begin(&self.pool, self.registry.clone()).await?)
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), RowmapError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
