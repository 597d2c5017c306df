//! Primary-key values and identity keys
//!
//! `KeyValue` is the hashable subset of runtime values that may appear
//! in a primary key; `IdentityKey` pairs one with its entity so a
//! session can deduplicate loaded instances.

use type_coercion::PgValue;
use uuid::Uuid;

/// A primary-key value. Integer widths collapse to `i64` so the same
/// row found through different code paths always hashes identically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Int(i64),
    Text(String),
    Uuid(Uuid),
    Bool(bool),
    Timestamp(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    /// Composite primary key, one entry per key field in declaration
    /// order.
    Composite(Vec<KeyValue>),
}

impl KeyValue {
    /// Convert a runtime value into a key value. Returns `None` for
    /// values that cannot serve as keys (null, float, JSON).
    pub fn from_value(value: &PgValue) -> Option<KeyValue> {
        match value {
            PgValue::SmallInt(v) => Some(KeyValue::Int(*v as i64)),
            PgValue::Integer(v) => Some(KeyValue::Int(*v as i64)),
            PgValue::BigInt(v) => Some(KeyValue::Int(*v)),
            PgValue::Text(v) => Some(KeyValue::Text(v.clone())),
            PgValue::Uuid(v) => Some(KeyValue::Uuid(*v)),
            PgValue::Boolean(v) => Some(KeyValue::Bool(*v)),
            PgValue::Timestamp(v) => Some(KeyValue::Timestamp(*v)),
            PgValue::Date(v) => Some(KeyValue::Date(*v)),
            PgValue::Float(_) | PgValue::Json(_) | PgValue::Null => None,
        }
    }

    /// Flatten into the bind values for a `WHERE pk = $n [AND ...]`
    /// clause, one entry per key column.
    pub fn to_bind_values(&self) -> Vec<PgValue> {
        match self {
            KeyValue::Int(v) => vec![PgValue::BigInt(*v)],
            KeyValue::Text(v) => vec![PgValue::Text(v.clone())],
            KeyValue::Uuid(v) => vec![PgValue::Uuid(*v)],
            KeyValue::Bool(v) => vec![PgValue::Boolean(*v)],
            KeyValue::Timestamp(v) => vec![PgValue::Timestamp(*v)],
            KeyValue::Date(v) => vec![PgValue::Date(*v)],
            KeyValue::Composite(parts) => {
                parts.iter().flat_map(|p| p.to_bind_values()).collect()
            }
        }
    }

    /// Number of key columns this value spans.
    pub fn width(&self) -> usize {
        match self {
            KeyValue::Composite(parts) => parts.iter().map(KeyValue::width).sum(),
            _ => 1,
        }
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int(v as i64)
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        KeyValue::Text(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        KeyValue::Text(v)
    }
}

impl From<Uuid> for KeyValue {
    fn from(v: Uuid) -> Self {
        KeyValue::Uuid(v)
    }
}

/// The key under which a session deduplicates loaded instances:
/// at most one live instance per `IdentityKey` per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub entity: String,
    pub key: KeyValue,
}

impl IdentityKey {
    pub fn new(entity: &str, key: KeyValue) -> Self {
        Self {
            entity: entity.to_string(),
            key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widths_collapse() {
        let a = KeyValue::from_value(&PgValue::Integer(7)).unwrap();
        let b = KeyValue::from_value(&PgValue::BigInt(7)).unwrap();
        let c = KeyValue::from_value(&PgValue::SmallInt(7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_unkeyable_values() {
        assert_eq!(KeyValue::from_value(&PgValue::Null), None);
        assert_eq!(KeyValue::from_value(&PgValue::Float(1.0)), None);
        assert_eq!(
            KeyValue::from_value(&PgValue::Json(serde_json::json!(1))),
            None
        );
    }

    #[test]
    fn test_composite_bind_values() {
        let key = KeyValue::Composite(vec![KeyValue::Int(1), KeyValue::Text("a".into())]);
        assert_eq!(key.width(), 2);
        assert_eq!(
            key.to_bind_values(),
            vec![PgValue::BigInt(1), PgValue::Text("a".into())]
        );
    }

    #[test]
    fn test_identity_key_equality() {
        let a = IdentityKey::new("user", KeyValue::Int(1));
        let b = IdentityKey::new("user", KeyValue::Int(1));
        let c = IdentityKey::new("post", KeyValue::Int(1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
