//! Logical column types
//!
//! This module defines the closed set of logical column types an entity
//! field may declare, and their PostgreSQL DDL spellings.

use crate::value::PgValue;

/// Logical type tag for a declared entity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Text,
    Uuid,
    Timestamp,
    Date,
    Json,
    /// Closed label set stored as TEXT; the allowed labels become a
    /// CHECK constraint in generated DDL.
    Enum { name: String, labels: Vec<String> },
}

impl ColumnType {
    /// PostgreSQL type name used in generated DDL.
    pub fn pg_type(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::Uuid => "UUID",
            ColumnType::Timestamp => "TIMESTAMP WITH TIME ZONE",
            ColumnType::Date => "DATE",
            ColumnType::Json => "JSONB",
            ColumnType::Enum { .. } => "TEXT",
        }
    }

    /// Type name as reported by `information_schema.columns.data_type`,
    /// used when diffing registered entities against a live database.
    pub fn information_schema_type(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::SmallInt => "smallint",
            ColumnType::Integer => "integer",
            ColumnType::BigInt => "bigint",
            ColumnType::Float => "double precision",
            ColumnType::Text => "text",
            ColumnType::Uuid => "uuid",
            ColumnType::Timestamp => "timestamp with time zone",
            ColumnType::Date => "date",
            ColumnType::Json => "jsonb",
            ColumnType::Enum { .. } => "text",
        }
    }

    /// Whether values of this type may participate in a primary key.
    /// Key values must be hashable and comparable on the Rust side, so
    /// float and JSON columns are excluded.
    pub fn is_keyable(&self) -> bool {
        !matches!(self, ColumnType::Float | ColumnType::Json)
    }

    /// Whether a runtime value is assignable to this column type.
    /// Integer widths widen (smallint fits integer fits bigint); all
    /// other variants must match exactly. Null is always assignable
    /// here; nullability is checked against the field descriptor.
    pub fn accepts(&self, value: &PgValue) -> bool {
        match (self, value) {
            (_, PgValue::Null) => true,
            (ColumnType::Boolean, PgValue::Boolean(_)) => true,
            (ColumnType::SmallInt, PgValue::SmallInt(_)) => true,
            (ColumnType::Integer, PgValue::SmallInt(_) | PgValue::Integer(_)) => true,
            (
                ColumnType::BigInt,
                PgValue::SmallInt(_) | PgValue::Integer(_) | PgValue::BigInt(_),
            ) => true,
            (ColumnType::Float, PgValue::Float(_)) => true,
            (ColumnType::Text, PgValue::Text(_)) => true,
            (ColumnType::Uuid, PgValue::Uuid(_)) => true,
            (ColumnType::Timestamp, PgValue::Timestamp(_)) => true,
            (ColumnType::Date, PgValue::Date(_)) => true,
            (ColumnType::Json, PgValue::Json(_)) => true,
            (ColumnType::Enum { labels, .. }, PgValue::Text(label)) => {
                labels.iter().any(|l| l == label)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Enum { name, .. } => write!(f, "enum({})", name),
            other => write!(f, "{}", other.information_schema_type()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pg_type_names() {
        assert_eq!(ColumnType::Integer.pg_type(), "INTEGER");
        assert_eq!(ColumnType::Timestamp.pg_type(), "TIMESTAMP WITH TIME ZONE");
        assert_eq!(ColumnType::Json.pg_type(), "JSONB");
        let status = ColumnType::Enum {
            name: "status".into(),
            labels: vec!["open".into(), "closed".into()],
        };
        assert_eq!(status.pg_type(), "TEXT");
    }

    #[test]
    fn test_keyable() {
        assert!(ColumnType::Integer.is_keyable());
        assert!(ColumnType::Uuid.is_keyable());
        assert!(ColumnType::Text.is_keyable());
        assert!(!ColumnType::Float.is_keyable());
        assert!(!ColumnType::Json.is_keyable());
    }

    #[test]
    fn test_accepts_widening_integers() {
        assert!(ColumnType::BigInt.accepts(&PgValue::Integer(1)));
        assert!(ColumnType::Integer.accepts(&PgValue::SmallInt(1)));
        assert!(!ColumnType::SmallInt.accepts(&PgValue::Integer(1)));
        assert!(!ColumnType::Integer.accepts(&PgValue::BigInt(1)));
    }

    #[test]
    fn test_accepts_null_and_mismatch() {
        assert!(ColumnType::Text.accepts(&PgValue::Null));
        assert!(!ColumnType::Text.accepts(&PgValue::Integer(3)));
        assert!(!ColumnType::Uuid.accepts(&PgValue::Text("not-a-uuid".into())));
    }

    #[test]
    fn test_accepts_enum_labels() {
        let status = ColumnType::Enum {
            name: "status".into(),
            labels: vec!["open".into(), "closed".into()],
        };
        assert!(status.accepts(&PgValue::Text("open".into())));
        assert!(!status.accepts(&PgValue::Text("unknown".into())));
    }
}
