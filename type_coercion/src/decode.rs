//! Row decoding
//!
//! Decodes a named column out of a `sqlx` row into a `PgValue`, driven
//! by the field's declared logical type rather than by a derive.

use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::column::ColumnType;
use crate::errors::CoercionError;
use crate::value::PgValue;

/// Decode one column of `row` according to the declared column type.
/// SQL NULL decodes to `PgValue::Null` regardless of the declared type;
/// nullability is a schema concern, not a decoding one.
pub fn decode_column(
    row: &PgRow,
    column: &str,
    ty: &ColumnType,
) -> Result<PgValue, CoercionError> {
    let decode_err = |source: sqlx::Error| CoercionError::Decode {
        column: column.to_string(),
        expected: ty.to_string(),
        source,
    };

    let value = match ty {
        ColumnType::Boolean => row
            .try_get::<Option<bool>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::Boolean),
        ColumnType::SmallInt => row
            .try_get::<Option<i16>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::SmallInt),
        ColumnType::Integer => row
            .try_get::<Option<i32>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::Integer),
        ColumnType::BigInt => row
            .try_get::<Option<i64>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::BigInt),
        ColumnType::Float => row
            .try_get::<Option<f64>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::Float),
        ColumnType::Text | ColumnType::Enum { .. } => row
            .try_get::<Option<String>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::Text),
        ColumnType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::Uuid),
        ColumnType::Timestamp => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::Timestamp),
        ColumnType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::Date),
        ColumnType::Json => row
            .try_get::<Option<serde_json::Value>, _>(column)
            .map_err(decode_err)?
            .map_or(PgValue::Null, PgValue::Json),
    };

    Ok(value)
}
