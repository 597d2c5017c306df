//! Runtime column values
//!
//! This module provides the tagged value variant that carries every
//! column value the mapper can read from or write to PostgreSQL.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single column value in transit between an entity instance and the
/// database. The set of variants is closed: every supported logical
/// column type maps onto exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PgValue {
    Text(String),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    Timestamp(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Json(serde_json::Value),
    Null,
}

impl PgValue {
    /// Variant name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PgValue::Text(_) => "text",
            PgValue::SmallInt(_) => "smallint",
            PgValue::Integer(_) => "integer",
            PgValue::BigInt(_) => "bigint",
            PgValue::Float(_) => "float",
            PgValue::Boolean(_) => "boolean",
            PgValue::Uuid(_) => "uuid",
            PgValue::Timestamp(_) => "timestamp",
            PgValue::Date(_) => "date",
            PgValue::Json(_) => "json",
            PgValue::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PgValue::Null)
    }
}

/// Convert basic Rust types to PgValue
impl From<String> for PgValue {
    fn from(val: String) -> Self {
        PgValue::Text(val)
    }
}

impl From<&str> for PgValue {
    fn from(val: &str) -> Self {
        PgValue::Text(val.to_string())
    }
}

impl From<i16> for PgValue {
    fn from(val: i16) -> Self {
        PgValue::SmallInt(val)
    }
}

impl From<i32> for PgValue {
    fn from(val: i32) -> Self {
        PgValue::Integer(val)
    }
}

impl From<i64> for PgValue {
    fn from(val: i64) -> Self {
        PgValue::BigInt(val)
    }
}

impl From<f64> for PgValue {
    fn from(val: f64) -> Self {
        PgValue::Float(val)
    }
}

impl From<bool> for PgValue {
    fn from(val: bool) -> Self {
        PgValue::Boolean(val)
    }
}

impl From<Uuid> for PgValue {
    fn from(val: Uuid) -> Self {
        PgValue::Uuid(val)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for PgValue {
    fn from(val: chrono::DateTime<chrono::Utc>) -> Self {
        PgValue::Timestamp(val)
    }
}

impl From<chrono::NaiveDate> for PgValue {
    fn from(val: chrono::NaiveDate) -> Self {
        PgValue::Date(val)
    }
}

impl From<serde_json::Value> for PgValue {
    fn from(val: serde_json::Value) -> Self {
        PgValue::Json(val)
    }
}

impl<T> From<Option<T>> for PgValue
where
    T: Into<PgValue>,
{
    fn from(val: Option<T>) -> Self {
        match val {
            Some(v) => v.into(),
            None => PgValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scalars() {
        assert_eq!(PgValue::from("abc"), PgValue::Text("abc".to_string()));
        assert_eq!(PgValue::from(7i32), PgValue::Integer(7));
        assert_eq!(PgValue::from(7i64), PgValue::BigInt(7));
        assert_eq!(PgValue::from(true), PgValue::Boolean(true));
    }

    #[test]
    fn test_from_option() {
        let some: PgValue = Some(5i32).into();
        let none: PgValue = Option::<i32>::None.into();
        assert_eq!(some, PgValue::Integer(5));
        assert_eq!(none, PgValue::Null);
        assert!(none.is_null());
    }

    #[test]
    fn test_type_name() {
        assert_eq!(PgValue::Null.type_name(), "null");
        assert_eq!(PgValue::Uuid(Uuid::nil()).type_name(), "uuid");
        assert_eq!(PgValue::Json(serde_json::json!({"a": 1})).type_name(), "json");
    }
}
