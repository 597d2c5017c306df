//! Schema migration planning
//!
//! Compares the registered entity descriptors against the live
//! database schema (read through `information_schema`) and produces an
//! additive-only plan: create missing tables, add missing columns.
//! Anything destructive (dropped columns, changed types) is surfaced
//! as a warning and never executed.

use std::collections::BTreeMap;

use sqlx::{PgPool, Row};

use schema_registry::{
    DefaultPolicy, EntityDescriptor, FieldDescriptor, RelationshipKind, SchemaRegistry,
};
use type_coercion::ColumnType;

use crate::errors::RowmapError;
use crate::Rowmap;

/// One column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSchema {
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
}

/// One live table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSchema {
    pub columns: BTreeMap<String, ColumnSchema>,
}

/// The introspected state of the database, keyed by (schema, table).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseSchema {
    pub tables: BTreeMap<(String, String), TableSchema>,
}

/// An additive DDL operation the plan will execute.
#[derive(Debug, Clone, PartialEq)]
pub enum DdlOperation {
    CreateTable { table: String, sql: String },
    AddColumn { table: String, column: String, sql: String },
}

impl DdlOperation {
    pub fn sql(&self) -> &str {
        match self {
            DdlOperation::CreateTable { sql, .. } => sql,
            DdlOperation::AddColumn { sql, .. } => sql,
        }
    }
}

/// Drift the plan refuses to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationWarning {
    TypeMismatch {
        table: String,
        column: String,
        declared: String,
        actual: String,
    },
    NullabilityMismatch {
        table: String,
        column: String,
        declared_nullable: bool,
    },
    UnexpectedColumn { table: String, column: String },
    UnexpectedTable { table: String },
    NotNullWithoutDefault { table: String, column: String },
}

impl std::fmt::Display for MigrationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationWarning::TypeMismatch {
                table,
                column,
                declared,
                actual,
            } => write!(
                f,
                "column {}.{} is declared {} but the database has {}; not changed",
                table, column, declared, actual
            ),
            MigrationWarning::NullabilityMismatch {
                table,
                column,
                declared_nullable,
            } => write!(
                f,
                "column {}.{} nullability differs from the declaration (declared nullable: {}); not changed",
                table, column, declared_nullable
            ),
            MigrationWarning::UnexpectedColumn { table, column } => write!(
                f,
                "column {}.{} exists in the database but is not declared; not dropped",
                table, column
            ),
            MigrationWarning::UnexpectedTable { table } => write!(
                f,
                "table {} exists in the database but is not declared; not dropped",
                table
            ),
            MigrationWarning::NotNullWithoutDefault { table, column } => write!(
                f,
                "column {}.{} is declared NOT NULL without a default; added as nullable, backfill and constrain manually",
                table, column
            ),
        }
    }
}

/// Ordered additive operations plus the warnings the comparison raised.
#[derive(Debug, Default)]
pub struct MigrationPlan {
    pub operations: Vec<DdlOperation>,
    pub warnings: Vec<MigrationWarning>,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn descriptor_schema(descriptor: &EntityDescriptor) -> String {
    descriptor
        .table
        .schema
        .as_ref()
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| "public".to_string())
}

/// Escape a string literal for a CHECK constraint label list.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn column_ddl(field: &FieldDescriptor, for_alter: bool) -> (String, Option<()>) {
    let mut parts = vec![field.name.quoted(), field.column_type.pg_type().to_string()];
    let mut relaxed = None;

    if let DefaultPolicy::DatabaseDefault(expr) = &field.default {
        parts.push(format!("DEFAULT {}", expr));
    }
    if !field.nullable && !field.primary {
        let has_default = matches!(field.default, DefaultPolicy::DatabaseDefault(_));
        if for_alter && !has_default {
            // Adding NOT NULL without a default would fail on any
            // existing rows; relax it and warn.
            relaxed = Some(());
        } else {
            parts.push("NOT NULL".to_string());
        }
    }
    if field.unique {
        parts.push("UNIQUE".to_string());
    }
    if let ColumnType::Enum { labels, .. } = &field.column_type {
        let list = labels
            .iter()
            .map(|l| quote_literal(l))
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("CHECK ({} IN ({}))", field.name.quoted(), list));
    }
    if let Some(expr) = &field.check {
        parts.push(format!("CHECK ({})", expr));
    }

    (parts.join(" "), relaxed)
}

/// CREATE TABLE for a descriptor, including primary key and the
/// foreign keys its many-to-one relationships imply. The FK action is
/// left at the database default (NO ACTION); cascade behavior is a
/// flush-time, opt-in concern.
pub fn create_table_sql(
    registry: &SchemaRegistry,
    descriptor: &EntityDescriptor,
) -> Result<String, RowmapError> {
    let mut lines = Vec::new();
    for field in &descriptor.fields {
        // NOT NULL on key columns is implied by PRIMARY KEY below.
        let (ddl, _) = column_ddl(field, false);
        lines.push(format!("    {}", ddl));
    }

    let pk = descriptor
        .primary_key_fields()
        .iter()
        .map(|f| f.name.quoted())
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(format!("    PRIMARY KEY ({})", pk));

    for rel in &descriptor.relationships {
        if let RelationshipKind::ManyToOne { fk_field } = &rel.kind {
            let target = registry.resolve(&rel.target)?;
            let target_pk = target
                .primary_key_fields()
                .iter()
                .map(|f| f.name.quoted())
                .collect::<Vec<_>>()
                .join(", ");
            if let Some(field) = descriptor.field(fk_field) {
                lines.push(format!(
                    "    FOREIGN KEY ({}) REFERENCES {} ({})",
                    field.name.quoted(),
                    target.table.qualified(),
                    target_pk
                ));
            }
        }
    }

    Ok(format!(
        "CREATE TABLE {} (\n{}\n)",
        descriptor.table.qualified(),
        lines.join(",\n")
    ))
}

/// CREATE TABLE for a many-to-many join table: both foreign keys, a
/// composite primary key, and references to both sides.
fn create_join_table_sql(
    source: &EntityDescriptor,
    target: &EntityDescriptor,
    join_table: &str,
    left_fk: &str,
    right_fk: &str,
) -> String {
    let source_pk = &source.primary_key_fields()[0];
    let target_pk = &target.primary_key_fields()[0];
    format!(
        "CREATE TABLE \"{join}\" (\n    \"{left}\" {left_ty} NOT NULL,\n    \"{right}\" {right_ty} NOT NULL,\n    PRIMARY KEY (\"{left}\", \"{right}\"),\n    FOREIGN KEY (\"{left}\") REFERENCES {source_table} ({source_pk}),\n    FOREIGN KEY (\"{right}\") REFERENCES {target_table} ({target_pk})\n)",
        join = join_table,
        left = left_fk,
        left_ty = source_pk.column_type.pg_type(),
        right = right_fk,
        right_ty = target_pk.column_type.pg_type(),
        source_table = source.table.qualified(),
        source_pk = source_pk.name.quoted(),
        target_table = target.table.qualified(),
        target_pk = target_pk.name.quoted(),
    )
}

/// Compare registered descriptors against the live schema. Pure; the
/// caller decides whether to execute the plan.
pub fn migration_plan(
    registry: &SchemaRegistry,
    live: &DatabaseSchema,
) -> Result<MigrationPlan, RowmapError> {
    let mut plan = MigrationPlan::default();
    let mut declared_tables: Vec<(String, String)> = Vec::new();

    for descriptor in registry.entities() {
        let schema = descriptor_schema(descriptor);
        let table = descriptor.table.table.as_str().to_string();
        declared_tables.push((schema.clone(), table.clone()));

        let Some(live_table) = live.tables.get(&(schema.clone(), table.clone())) else {
            plan.operations.push(DdlOperation::CreateTable {
                table: table.clone(),
                sql: create_table_sql(registry, descriptor)?,
            });
            continue;
        };

        for field in &descriptor.fields {
            let column = field.name.as_str();
            match live_table.columns.get(column) {
                None => {
                    let (ddl, relaxed) = column_ddl(field, true);
                    if relaxed.is_some() {
                        plan.warnings.push(MigrationWarning::NotNullWithoutDefault {
                            table: table.clone(),
                            column: column.to_string(),
                        });
                    }
                    plan.operations.push(DdlOperation::AddColumn {
                        table: table.clone(),
                        column: column.to_string(),
                        sql: format!(
                            "ALTER TABLE {} ADD COLUMN {}",
                            descriptor.table.qualified(),
                            ddl
                        ),
                    });
                }
                Some(live_column) => {
                    let declared = field.column_type.information_schema_type();
                    if live_column.data_type != declared {
                        plan.warnings.push(MigrationWarning::TypeMismatch {
                            table: table.clone(),
                            column: column.to_string(),
                            declared: declared.to_string(),
                            actual: live_column.data_type.clone(),
                        });
                    }
                    if live_column.is_nullable != field.nullable && !field.primary {
                        plan.warnings.push(MigrationWarning::NullabilityMismatch {
                            table: table.clone(),
                            column: column.to_string(),
                            declared_nullable: field.nullable,
                        });
                    }
                }
            }
        }

        for column in live_table.columns.keys() {
            if descriptor.field(column).is_none() {
                plan.warnings.push(MigrationWarning::UnexpectedColumn {
                    table: table.clone(),
                    column: column.clone(),
                });
            }
        }
    }

    // Join tables implied by many-to-many relationships.
    for descriptor in registry.entities() {
        let schema = descriptor_schema(descriptor);
        for rel in &descriptor.relationships {
            if let RelationshipKind::ManyToMany {
                join_table,
                left_fk,
                right_fk,
            } = &rel.kind
            {
                declared_tables.push((schema.clone(), join_table.clone()));
                if live.tables.contains_key(&(schema.clone(), join_table.clone())) {
                    continue;
                }
                let target = registry.resolve(&rel.target)?;
                plan.operations.push(DdlOperation::CreateTable {
                    table: join_table.clone(),
                    sql: create_join_table_sql(
                        descriptor, target, join_table, left_fk, right_fk,
                    ),
                });
            }
        }
    }

    for (schema, table) in live.tables.keys() {
        let known = declared_tables
            .iter()
            .any(|(s, t)| s == schema && t == table);
        if !known {
            plan.warnings.push(MigrationWarning::UnexpectedTable {
                table: format!("{}.{}", schema, table),
            });
        }
    }

    Ok(plan)
}

/// Read the live schema for the given PostgreSQL schemas through
/// `information_schema`.
pub async fn introspect(pool: &PgPool, schemas: &[&str]) -> Result<DatabaseSchema, RowmapError> {
    let schema_list: Vec<String> = schemas.iter().map(|s| s.to_string()).collect();
    let mut database = DatabaseSchema::default();

    let tables = sqlx::query(
        "SELECT table_schema, table_name \
         FROM information_schema.tables \
         WHERE table_schema = ANY($1) AND table_type = 'BASE TABLE'",
    )
    .bind(&schema_list)
    .fetch_all(pool)
    .await?;

    for row in tables {
        let schema: String = row.try_get("table_schema")?;
        let table: String = row.try_get("table_name")?;
        database.tables.insert((schema, table), TableSchema::default());
    }

    let columns = sqlx::query(
        "SELECT table_schema, table_name, column_name, data_type, is_nullable, column_default \
         FROM information_schema.columns \
         WHERE table_schema = ANY($1) \
         ORDER BY ordinal_position",
    )
    .bind(&schema_list)
    .fetch_all(pool)
    .await?;

    for row in columns {
        let schema: String = row.try_get("table_schema")?;
        let table: String = row.try_get("table_name")?;
        let Some(table_schema) = database.tables.get_mut(&(schema, table)) else {
            continue;
        };
        let name: String = row.try_get("column_name")?;
        let data_type: String = row.try_get("data_type")?;
        let is_nullable: String = row.try_get("is_nullable")?;
        let default: Option<String> = row.try_get("column_default")?;
        table_schema.columns.insert(
            name,
            ColumnSchema {
                data_type,
                is_nullable: is_nullable == "YES",
                default,
            },
        );
    }

    Ok(database)
}

impl Rowmap {
    /// Distinct PostgreSQL schemas the registered entities live in.
    fn declared_schemas(&self) -> Vec<String> {
        let mut schemas: Vec<String> = self
            .registry()
            .entities()
            .map(descriptor_schema)
            .collect();
        schemas.sort();
        schemas.dedup();
        schemas
    }

    /// Introspect the live database and compute the additive plan.
    pub async fn migration_plan(&self) -> Result<MigrationPlan, RowmapError> {
        let schemas = self.declared_schemas();
        let schema_refs: Vec<&str> = schemas.iter().map(String::as_str).collect();
        let live = introspect(self.pool(), &schema_refs).await?;
        migration_plan(self.registry(), &live)
    }

    /// Compute and execute the additive plan inside one transaction.
    /// Warnings are logged, never acted on.
    pub async fn apply_migrations(&self) -> Result<MigrationPlan, RowmapError> {
        let plan = self.migration_plan().await?;
        for warning in &plan.warnings {
            tracing::warn!(%warning, "schema drift");
        }
        if plan.is_empty() {
            return Ok(plan);
        }

        let mut tx = self.pool().begin().await?;
        for operation in &plan.operations {
            tracing::info!(sql = operation.sql(), "applying migration");
            sqlx::query(operation.sql())
                .execute(tx.as_mut())
                .await
                .map_err(|source| RowmapError::Migration {
                    statement: operation.sql().to_string(),
                    source,
                })?;
        }
        tx.commit().await?;
        Ok(plan)
    }
}
