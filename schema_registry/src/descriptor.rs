//! Entity and field descriptors
//!
//! The validated, immutable description of one mapped entity, plus the
//! explicit builder application code uses to declare it. There is no
//! reflection anywhere: what you declare is exactly what is mapped.

use std::collections::BTreeMap;

use type_coercion::{ColumnType, PgValue};

use crate::errors::SchemaError;
use crate::identifier::SqlIdentifier;
use crate::key::KeyValue;
use crate::relationship::Relationship;

/// A schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: Option<SqlIdentifier>,
    pub table: SqlIdentifier,
}

impl TableName {
    /// Quoted, schema-qualified form for SQL text.
    pub fn qualified(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema.quoted(), self.table.quoted()),
            None => self.table.quoted(),
        }
    }
}

/// Default-value policy for a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultPolicy {
    /// No default; a value must be provided on insert unless nullable.
    None,
    /// The database fills the column from this SQL expression when the
    /// insert omits it.
    DatabaseDefault(String),
}

/// Validated description of one mapped column.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: SqlIdentifier,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary: bool,
    pub default: DefaultPolicy,
    pub unique: bool,
    pub check: Option<String>,
}

/// Validated description of one mapped entity. Immutable after
/// registration; owned by the schema registry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub entity: String,
    pub table: TableName,
    pub fields: Vec<FieldDescriptor>,
    pub relationships: Vec<Relationship>,
}

impl EntityDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name.as_str() == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Primary-key fields in declaration order.
    pub fn primary_key_fields(&self) -> Vec<&FieldDescriptor> {
        self.fields.iter().filter(|f| f.primary).collect()
    }

    /// Extract the primary-key value from a column/value record.
    /// Returns `None` when any key column is absent or null.
    pub fn identify_record(&self, record: &BTreeMap<String, PgValue>) -> Option<KeyValue> {
        let mut parts = Vec::new();
        for field in self.primary_key_fields() {
            let value = record.get(field.name.as_str())?;
            parts.push(KeyValue::from_value(value)?);
        }
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(KeyValue::Composite(parts)),
        }
    }

    /// The name PostgreSQL gives a single-column unique constraint,
    /// `<table>_<column>_key`, used to match reported violations back
    /// to declared fields.
    pub fn unique_constraint_name(&self, field: &str) -> String {
        format!("{}_{}_key", self.table.table.as_str(), field)
    }
}

/// Declarative field definition, consumed by [`EntityDefinition`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    name: String,
    column_type: ColumnType,
    nullable: bool,
    primary: bool,
    default: DefaultPolicy,
    unique: bool,
    check: Option<String>,
}

impl FieldDef {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            primary: false,
            default: DefaultPolicy::None,
            unique: false,
            check: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_expr(mut self, expr: &str) -> Self {
        self.default = DefaultPolicy::DatabaseDefault(expr.to_string());
        self
    }

    pub fn check(mut self, expr: &str) -> Self {
        self.check = Some(expr.to_string());
        self
    }
}

/// Declarative entity definition: the input to
/// [`SchemaRegistry::register`](crate::registry::SchemaRegistry::register).
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDefinition {
    entity: String,
    schema: Option<String>,
    table: String,
    fields: Vec<FieldDef>,
    relationships: Vec<Relationship>,
}

impl EntityDefinition {
    /// Start a definition mapping `entity` onto `table`.
    pub fn new(entity: &str, table: &str) -> Self {
        Self {
            entity: entity.to_string(),
            schema: None,
            table: table.to_string(),
            fields: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.to_string());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn entity_name(&self) -> &str {
        &self.entity
    }

    /// Validate and freeze into a descriptor. Cross-entity checks
    /// (relationship targets) happen later, at registry finalization.
    pub(crate) fn build(self) -> Result<EntityDescriptor, SchemaError> {
        let entity = self.entity;
        if self.fields.is_empty() {
            return Err(SchemaError::NoFields { entity });
        }

        let table = TableName {
            schema: self.schema.as_deref().map(SqlIdentifier::new).transpose()?,
            table: SqlIdentifier::new(&self.table)?,
        };

        let mut fields = Vec::with_capacity(self.fields.len());
        for def in self.fields {
            let name = SqlIdentifier::new(&def.name)?;
            if fields.iter().any(|f: &FieldDescriptor| f.name == name) {
                return Err(SchemaError::DuplicateField {
                    entity,
                    field: def.name,
                });
            }
            if def.primary {
                if !def.column_type.is_keyable() {
                    return Err(SchemaError::UnkeyablePrimaryKey {
                        entity,
                        field: def.name,
                        column_type: def.column_type.to_string(),
                    });
                }
                if def.nullable {
                    return Err(SchemaError::NullablePrimaryKey {
                        entity,
                        field: def.name,
                    });
                }
            }
            fields.push(FieldDescriptor {
                name,
                column_type: def.column_type,
                nullable: def.nullable,
                primary: def.primary,
                default: def.default,
                unique: def.unique,
                check: def.check,
            });
        }

        if !fields.iter().any(|f| f.primary) {
            return Err(SchemaError::MissingPrimaryKey { entity });
        }

        let mut relationships: Vec<Relationship> = Vec::with_capacity(self.relationships.len());
        for rel in self.relationships {
            if relationships.iter().any(|r| r.name == rel.name) {
                return Err(SchemaError::DuplicateRelationship {
                    entity,
                    relationship: rel.name,
                });
            }
            relationships.push(rel);
        }

        Ok(EntityDescriptor {
            entity,
            table,
            fields,
            relationships,
        })
    }
}
