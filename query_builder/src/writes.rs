//! Write-statement compilation
//!
//! INSERT/UPDATE/DELETE statements and the keyed SELECTs the session
//! layer needs. Every statement carries explicit column lists and a
//! RETURNING clause where the session reads back database-assigned
//! values; parameters are numbered in the order they are bound.

use std::collections::{BTreeMap, BTreeSet};

use schema_registry::{EntityDescriptor, KeyValue, SqlIdentifier};
use type_coercion::PgValue;

use crate::compile::CompiledQuery;
use crate::errors::UnsupportedQueryError;

/// All declared columns, quoted, in declaration order.
fn column_list(descriptor: &EntityDescriptor) -> String {
    descriptor
        .fields
        .iter()
        .map(|f| f.name.quoted())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `"pk1" = $n AND "pk2" = $n+1` for the descriptor's key columns,
/// starting at placeholder `start`. Returns the clause and the binds.
fn key_predicate(
    descriptor: &EntityDescriptor,
    key: &KeyValue,
    start: usize,
) -> Result<(String, Vec<PgValue>), UnsupportedQueryError> {
    let pk = descriptor.primary_key_fields();
    let binds = key.to_bind_values();
    if binds.len() != pk.len() {
        return Err(UnsupportedQueryError::KeyWidthMismatch {
            entity: descriptor.entity.clone(),
            expected: pk.len(),
            actual: binds.len(),
        });
    }
    let clause = pk
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{} = ${}", f.name.quoted(), start + i))
        .collect::<Vec<_>>()
        .join(" AND ");
    Ok((clause, binds))
}

/// INSERT with the record's columns in declaration order. Columns the
/// record omits are left to the database (defaults, nullable columns).
pub fn compile_insert(
    descriptor: &EntityDescriptor,
    record: &BTreeMap<String, PgValue>,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    let mut columns = Vec::new();
    let mut binds = Vec::new();
    for field in &descriptor.fields {
        if let Some(value) = record.get(field.name.as_str()) {
            columns.push(field.name.quoted());
            binds.push(value.clone());
        }
    }

    let sql = if columns.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            descriptor.table.qualified(),
            column_list(descriptor)
        )
    } else {
        let placeholders: Vec<String> = (1..=columns.len()).map(|n| format!("${}", n)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            descriptor.table.qualified(),
            columns.join(", "),
            placeholders.join(", "),
            column_list(descriptor)
        )
    };

    Ok(CompiledQuery { sql, binds })
}

/// UPDATE of the dirty columns only, keyed by primary key. SET
/// parameters come first, key parameters after, matching their order
/// in the SQL text.
pub fn compile_update(
    descriptor: &EntityDescriptor,
    key: &KeyValue,
    record: &BTreeMap<String, PgValue>,
    dirty: &BTreeSet<String>,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    let mut assignments = Vec::new();
    let mut binds = Vec::new();
    for field in &descriptor.fields {
        if field.primary || !dirty.contains(field.name.as_str()) {
            continue;
        }
        if let Some(value) = record.get(field.name.as_str()) {
            assignments.push(format!("{} = ${}", field.name.quoted(), assignments.len() + 1));
            binds.push(value.clone());
        }
    }
    if assignments.is_empty() {
        return Err(UnsupportedQueryError::EmptyUpdate {
            entity: descriptor.entity.clone(),
        });
    }

    let (where_clause, key_binds) = key_predicate(descriptor, key, binds.len() + 1)?;
    binds.extend(key_binds);

    let sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        descriptor.table.qualified(),
        assignments.join(", "),
        where_clause,
        column_list(descriptor)
    );
    Ok(CompiledQuery { sql, binds })
}

/// DELETE one row by primary key.
pub fn compile_delete(
    descriptor: &EntityDescriptor,
    key: &KeyValue,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    let (where_clause, binds) = key_predicate(descriptor, key, 1)?;
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        descriptor.table.qualified(),
        where_clause
    );
    Ok(CompiledQuery { sql, binds })
}

/// SELECT one row by primary key.
pub fn compile_select_by_key(
    descriptor: &EntityDescriptor,
    key: &KeyValue,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    let (where_clause, binds) = key_predicate(descriptor, key, 1)?;
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        column_list(descriptor),
        descriptor.table.qualified(),
        where_clause
    );
    Ok(CompiledQuery { sql, binds })
}

/// Batched SELECT by primary keys. Single-column keys compile to an
/// `IN` list, composite keys to a row-value `IN`.
pub fn compile_select_by_keys(
    descriptor: &EntityDescriptor,
    keys: &[KeyValue],
) -> Result<CompiledQuery, UnsupportedQueryError> {
    if keys.is_empty() {
        return Err(UnsupportedQueryError::EmptyKeyList {
            entity: descriptor.entity.clone(),
        });
    }
    let pk = descriptor.primary_key_fields();
    let mut binds = Vec::new();
    let mut tuples = Vec::with_capacity(keys.len());
    for key in keys {
        let key_binds = key.to_bind_values();
        if key_binds.len() != pk.len() {
            return Err(UnsupportedQueryError::KeyWidthMismatch {
                entity: descriptor.entity.clone(),
                expected: pk.len(),
                actual: key_binds.len(),
            });
        }
        let placeholders: Vec<String> = (0..key_binds.len())
            .map(|i| format!("${}", binds.len() + i + 1))
            .collect();
        binds.extend(key_binds);
        if pk.len() == 1 {
            tuples.push(placeholders.into_iter().next().unwrap_or_default());
        } else {
            tuples.push(format!("({})", placeholders.join(", ")));
        }
    }

    let key_columns = if pk.len() == 1 {
        pk[0].name.quoted()
    } else {
        format!(
            "({})",
            pk.iter().map(|f| f.name.quoted()).collect::<Vec<_>>().join(", ")
        )
    };

    let sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({})",
        column_list(descriptor),
        descriptor.table.qualified(),
        key_columns,
        tuples.join(", ")
    );
    Ok(CompiledQuery { sql, binds })
}

/// SELECT child rows by a foreign-key column value.
pub fn compile_select_by_fk(
    descriptor: &EntityDescriptor,
    fk_field: &str,
    parent_key: &KeyValue,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    let field = descriptor.field(fk_field).ok_or_else(|| {
        UnsupportedQueryError::UnknownColumn {
            alias: descriptor.entity.clone(),
            column: fk_field.to_string(),
        }
    })?;
    let binds = parent_key.to_bind_values();
    if binds.len() != 1 {
        return Err(UnsupportedQueryError::KeyWidthMismatch {
            entity: descriptor.entity.clone(),
            expected: 1,
            actual: binds.len(),
        });
    }
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        column_list(descriptor),
        descriptor.table.qualified(),
        field.name.quoted()
    );
    Ok(CompiledQuery { sql, binds })
}

/// SELECT related rows through a many-to-many join table.
pub fn compile_select_via_join_table(
    target: &EntityDescriptor,
    join_table: &str,
    left_fk: &str,
    right_fk: &str,
    parent_key: &KeyValue,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    let join_table = SqlIdentifier::new(join_table)?;
    let left_fk = SqlIdentifier::new(left_fk)?;
    let right_fk = SqlIdentifier::new(right_fk)?;
    let pk = target.primary_key_fields();
    if pk.len() != 1 {
        return Err(UnsupportedQueryError::KeyWidthMismatch {
            entity: target.entity.clone(),
            expected: 1,
            actual: pk.len(),
        });
    }
    let binds = parent_key.to_bind_values();
    if binds.len() != 1 {
        return Err(UnsupportedQueryError::KeyWidthMismatch {
            entity: target.entity.clone(),
            expected: 1,
            actual: binds.len(),
        });
    }

    let columns = target
        .fields
        .iter()
        .map(|f| format!("\"t\".{}", f.name.quoted()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM {} \"t\" JOIN {} \"jt\" ON \"t\".{} = \"jt\".{} WHERE \"jt\".{} = $1",
        columns,
        target.table.qualified(),
        join_table.quoted(),
        pk[0].name.quoted(),
        right_fk.quoted(),
        left_fk.quoted()
    );
    Ok(CompiledQuery { sql, binds })
}

/// DELETE dependent rows by foreign-key value (cascade support).
pub fn compile_delete_by_fk(
    descriptor: &EntityDescriptor,
    fk_field: &str,
    parent_key: &KeyValue,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    let field = descriptor.field(fk_field).ok_or_else(|| {
        UnsupportedQueryError::UnknownColumn {
            alias: descriptor.entity.clone(),
            column: fk_field.to_string(),
        }
    })?;
    let binds = parent_key.to_bind_values();
    if binds.len() != 1 {
        return Err(UnsupportedQueryError::KeyWidthMismatch {
            entity: descriptor.entity.clone(),
            expected: 1,
            actual: binds.len(),
        });
    }
    let sql = format!(
        "DELETE FROM {} WHERE {} = $1",
        descriptor.table.qualified(),
        field.name.quoted()
    );
    Ok(CompiledQuery { sql, binds })
}

/// DELETE join-table rows referencing a parent (many-to-many cascade).
pub fn compile_delete_join_rows(
    join_table: &str,
    left_fk: &str,
    parent_key: &KeyValue,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    let join_table = SqlIdentifier::new(join_table)?;
    let left_fk = SqlIdentifier::new(left_fk)?;
    let binds = parent_key.to_bind_values();
    let sql = format!(
        "DELETE FROM {} WHERE {} = $1",
        join_table.quoted(),
        left_fk.quoted()
    );
    Ok(CompiledQuery { sql, binds })
}
