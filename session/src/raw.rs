//! Raw statements with named parameters
//!
//! Rewrites `:name` placeholders in a hand-written statement into
//! positional `$n` binds. Values are still bound, never interpolated;
//! string literals, quoted identifiers, and `::` casts are left alone.

use std::collections::BTreeMap;

use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use query_builder::CompiledQuery;
use type_coercion::PgValue;

use crate::errors::{HydrationError, SessionError};

/// Rewrite a `:name`-parameterized statement into positional form.
/// Repeated references to the same parameter reuse one placeholder.
pub fn rewrite_named_params(
    sql: &str,
    params: &[(&str, PgValue)],
) -> Result<CompiledQuery, SessionError> {
    let mut out = String::with_capacity(sql.len());
    let mut binds: Vec<PgValue> = Vec::new();
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();

    let mut chars = sql.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            // String literal: copy verbatim through the closing quote.
            '\'' | '"' => {
                out.push(ch);
                for (_, inner) in chars.by_ref() {
                    out.push(inner);
                    if inner == ch {
                        break;
                    }
                }
            }
            ':' => {
                // A `::` cast is not a parameter.
                if matches!(chars.peek(), Some((_, ':'))) {
                    out.push_str("::");
                    chars.next();
                    continue;
                }
                let start = idx + 1;
                let mut end = start;
                while let Some((i, c)) = chars.peek().copied() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if end == start {
                    out.push(':');
                    continue;
                }
                let name = &sql[start..end];
                let position = match positions.get(name) {
                    Some(position) => *position,
                    None => {
                        let value = params
                            .iter()
                            .find(|(n, _)| *n == name)
                            .map(|(_, v)| v.clone())
                            .ok_or_else(|| SessionError::UnknownParameter {
                                name: name.to_string(),
                            })?;
                        binds.push(value);
                        positions.insert(name.to_string(), binds.len());
                        binds.len()
                    }
                };
                out.push_str(&format!("${}", position));
            }
            _ => out.push(ch),
        }
    }

    Ok(CompiledQuery { sql: out, binds })
}

/// Decode a row of unknown shape by the reported SQL types. Used only
/// for raw statements; entity queries decode by descriptor.
pub fn decode_row_dynamic(row: &PgRow) -> Result<BTreeMap<String, PgValue>, HydrationError> {
    let mut record = BTreeMap::new();
    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let raw = row
            .try_get_raw(index)
            .map_err(|_| HydrationError::MissingColumn {
                column: name.clone(),
            })?;
        if raw.is_null() {
            record.insert(name, PgValue::Null);
            continue;
        }
        let type_name = column.type_info().name().to_string();
        let value = match type_name.as_str() {
            "BOOL" => PgValue::Boolean(get(row, index, &name, &type_name)?),
            "INT2" => PgValue::SmallInt(get(row, index, &name, &type_name)?),
            "INT4" => PgValue::Integer(get(row, index, &name, &type_name)?),
            "INT8" => PgValue::BigInt(get(row, index, &name, &type_name)?),
            "FLOAT8" => PgValue::Float(get(row, index, &name, &type_name)?),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                PgValue::Text(get(row, index, &name, &type_name)?)
            }
            "UUID" => PgValue::Uuid(get(row, index, &name, &type_name)?),
            "TIMESTAMPTZ" => PgValue::Timestamp(get(row, index, &name, &type_name)?),
            "DATE" => PgValue::Date(get(row, index, &name, &type_name)?),
            "JSON" | "JSONB" => PgValue::Json(get(row, index, &name, &type_name)?),
            other => {
                return Err(HydrationError::UnsupportedSqlType {
                    column: name,
                    sql_type: other.to_string(),
                })
            }
        };
        record.insert(name, value);
    }
    Ok(record)
}

fn get<'r, T>(
    row: &'r PgRow,
    index: usize,
    column: &str,
    sql_type: &str,
) -> Result<T, HydrationError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<T, _>(index)
        .map_err(|_| HydrationError::UnsupportedSqlType {
            column: column.to_string(),
            sql_type: sql_type.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_simple_params() {
        let query = rewrite_named_params(
            "SELECT * FROM users WHERE id = :id AND email = :email",
            &[
                ("id", PgValue::Integer(1)),
                ("email", PgValue::Text("a@x.com".into())),
            ],
        )
        .unwrap();
        assert_eq!(
            query.sql,
            "SELECT * FROM users WHERE id = $1 AND email = $2"
        );
        assert_eq!(query.binds.len(), 2);
    }

    #[test]
    fn test_repeated_param_reuses_placeholder() {
        let query = rewrite_named_params(
            "SELECT :a, :b, :a",
            &[("a", PgValue::Integer(1)), ("b", PgValue::Integer(2))],
        )
        .unwrap();
        assert_eq!(query.sql, "SELECT $1, $2, $1");
        assert_eq!(query.binds.len(), 2);
    }

    #[test]
    fn test_cast_is_not_a_param() {
        let query = rewrite_named_params("SELECT '5'::INT", &[]).unwrap();
        assert_eq!(query.sql, "SELECT '5'::INT");
        assert!(query.binds.is_empty());
    }

    #[test]
    fn test_literals_are_untouched() {
        let query = rewrite_named_params(
            "SELECT ':not_a_param', \":also_not\" FROM t WHERE x = :x",
            &[("x", PgValue::Integer(1))],
        )
        .unwrap();
        assert_eq!(
            query.sql,
            "SELECT ':not_a_param', \":also_not\" FROM t WHERE x = $1"
        );
        assert_eq!(query.binds.len(), 1);
    }

    #[test]
    fn test_missing_param_is_an_error() {
        assert!(matches!(
            rewrite_named_params("SELECT :missing", &[]),
            Err(SessionError::UnknownParameter { name }) if name == "missing"
        ));
    }

    #[test]
    fn test_adversarial_value_stays_bound() {
        let query = rewrite_named_params(
            "SELECT * FROM users WHERE name = :name",
            &[("name", PgValue::Text("'; DROP TABLE users; --".into()))],
        )
        .unwrap();
        assert!(!query.sql.contains("DROP TABLE"));
        assert_eq!(
            query.binds[0],
            PgValue::Text("'; DROP TABLE users; --".into())
        );
    }
}
