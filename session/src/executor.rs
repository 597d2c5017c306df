//! Statement execution
//!
//! Binds compiled queries onto the session's transaction and
//! translates PostgreSQL error reports into the typed session errors.
//! No statement is ever retried here; a failure belongs to the caller.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};

use query_builder::CompiledQuery;
use type_coercion::PgValue;

use crate::errors::{ConstraintKind, SessionError};

/// Bind one value onto a query. Exhaustive over the closed value
/// variant; a null binds as a typed none.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: PgValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        PgValue::Text(v) => query.bind(v),
        PgValue::SmallInt(v) => query.bind(v),
        PgValue::Integer(v) => query.bind(v),
        PgValue::BigInt(v) => query.bind(v),
        PgValue::Float(v) => query.bind(v),
        PgValue::Boolean(v) => query.bind(v),
        PgValue::Uuid(v) => query.bind(v),
        PgValue::Timestamp(v) => query.bind(v),
        PgValue::Date(v) => query.bind(v),
        PgValue::Json(v) => query.bind(v),
        PgValue::Null => query.bind(Option::<String>::None),
    }
}

fn prepare(compiled: &CompiledQuery) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&compiled.sql);
    for value in &compiled.binds {
        query = bind_value(query, value.clone());
    }
    query
}

pub(crate) async fn fetch_all(
    tx: &mut Transaction<'static, Postgres>,
    compiled: &CompiledQuery,
) -> Result<Vec<PgRow>, SessionError> {
    prepare(compiled)
        .fetch_all(tx.as_mut())
        .await
        .map_err(translate_db_error)
}

pub(crate) async fn fetch_optional(
    tx: &mut Transaction<'static, Postgres>,
    compiled: &CompiledQuery,
) -> Result<Option<PgRow>, SessionError> {
    prepare(compiled)
        .fetch_optional(tx.as_mut())
        .await
        .map_err(translate_db_error)
}

pub(crate) async fn fetch_one(
    tx: &mut Transaction<'static, Postgres>,
    compiled: &CompiledQuery,
) -> Result<PgRow, SessionError> {
    prepare(compiled)
        .fetch_one(tx.as_mut())
        .await
        .map_err(translate_db_error)
}

pub(crate) async fn execute(
    tx: &mut Transaction<'static, Postgres>,
    compiled: &CompiledQuery,
) -> Result<u64, SessionError> {
    prepare(compiled)
        .execute(tx.as_mut())
        .await
        .map(|done| done.rows_affected())
        .map_err(translate_db_error)
}

/// Map a sqlx error onto the session taxonomy, keeping the structured
/// detail (constraint name, table, SQLSTATE) PostgreSQL reports.
pub(crate) fn translate_db_error(err: sqlx::Error) -> SessionError {
    match err {
        sqlx::Error::PoolTimedOut => SessionError::PoolExhausted,
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            let kind = match code.as_str() {
                "23505" => Some(ConstraintKind::Unique),
                "23503" => Some(ConstraintKind::ForeignKey),
                "23514" => Some(ConstraintKind::Check),
                "23502" => Some(ConstraintKind::NotNull),
                _ => None,
            };
            if let Some(kind) = kind {
                return SessionError::ConstraintViolation {
                    kind,
                    constraint: db.constraint().map(str::to_string),
                    table: db.table().map(str::to_string),
                    code,
                };
            }
            if code == "57014" {
                // query_canceled: fired by statement_timeout.
                return SessionError::StatementTimeout;
            }
            SessionError::Database(sqlx::Error::Database(db))
        }
        other => SessionError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_translation() {
        assert!(matches!(
            translate_db_error(sqlx::Error::PoolTimedOut),
            SessionError::PoolExhausted
        ));
    }

    #[test]
    fn test_other_errors_stay_database_errors() {
        assert!(matches!(
            translate_db_error(sqlx::Error::RowNotFound),
            SessionError::Database(_)
        ));
    }
}
