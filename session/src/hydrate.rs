//! Result mapping
//!
//! Converts database rows into instances via the coercion layer, and
//! instances back into column/value records for the write compiler.

use std::collections::{BTreeMap, HashSet};

use sqlx::postgres::PgRow;
use sqlx::{Column, Row};

use schema_registry::EntityDescriptor;
use type_coercion::{decode_column, PgValue};

use crate::errors::HydrationError;
use crate::instance::InstanceRef;

/// How strictly a row must match the declared columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationMode {
    /// Every declared column must be present and nothing else:
    /// a column-count mismatch is a hard error.
    Full,
    /// The row was produced by an explicit partial projection; missing
    /// and extra columns are tolerated.
    Partial,
}

/// Decode a row into a column/value record according to the entity's
/// declared fields.
pub fn hydrate_record(
    row: &PgRow,
    descriptor: &EntityDescriptor,
    mode: HydrationMode,
) -> Result<BTreeMap<String, PgValue>, HydrationError> {
    let row_columns: HashSet<&str> = row.columns().iter().map(|c| c.name()).collect();
    let mut record = BTreeMap::new();

    for field in &descriptor.fields {
        let name = field.name.as_str();
        if !row_columns.contains(name) {
            match mode {
                HydrationMode::Full => {
                    return Err(HydrationError::MissingColumn {
                        column: name.to_string(),
                    })
                }
                HydrationMode::Partial => continue,
            }
        }
        let value = decode_column(row, name, &field.column_type)?;
        record.insert(name.to_string(), value);
    }

    if mode == HydrationMode::Full && row.columns().len() != descriptor.fields.len() {
        return Err(HydrationError::ColumnCountMismatch {
            expected: descriptor.fields.len(),
            actual: row.columns().len(),
        });
    }

    Ok(record)
}

/// Decode a row into a fresh, clean instance.
pub fn hydrate(
    row: &PgRow,
    descriptor: &EntityDescriptor,
    mode: HydrationMode,
) -> Result<InstanceRef, HydrationError> {
    let record = hydrate_record(row, descriptor, mode)?;
    Ok(InstanceRef::from_record(&descriptor.entity, record))
}

/// Convert an instance's current values into a column/value record for
/// the write compiler. Unknown fields and values incompatible with the
/// declared column type are rejected before any SQL is built.
pub fn dehydrate(
    instance: &InstanceRef,
    descriptor: &EntityDescriptor,
) -> Result<BTreeMap<String, PgValue>, HydrationError> {
    let values = instance.snapshot();
    for (field, value) in &values {
        let declared = descriptor.field(field).ok_or_else(|| {
            HydrationError::UnknownField {
                entity: descriptor.entity.clone(),
                field: field.clone(),
            }
        })?;
        if !declared.column_type.accepts(value) {
            return Err(HydrationError::TypeMismatch {
                entity: descriptor.entity.clone(),
                field: field.clone(),
                expected: declared.column_type.to_string(),
                found: value.type_name(),
            });
        }
    }
    Ok(values)
}
