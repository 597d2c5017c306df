//! SQL compilation
//!
//! Compiles a `QueryExpression` into SQL text plus an ordered bind
//! sequence. Clause order is fixed (SELECT list, FROM, JOINs, WHERE,
//! ORDER BY, LIMIT, OFFSET) so compiled text is reproducible, and
//! every application value becomes a `$n` placeholder.

use schema_registry::{EntityDescriptor, RelationshipKind, SchemaRegistry, SqlIdentifier};
use type_coercion::PgValue;

use crate::errors::UnsupportedQueryError;
use crate::expression::{ColumnRef, Projection, QueryExpression};
use crate::filter::{Condition, Filter, Predicate};

/// The output of compilation: SQL text and the values to bind, in
/// placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub binds: Vec<PgValue>,
}

/// Compile a SELECT returning entity rows.
pub fn compile_select(
    registry: &SchemaRegistry,
    expr: &QueryExpression,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    Compiler::new(registry, expr)?.select()
}

/// Compile the COUNT(*) form of the same expression: identical FROM,
/// JOIN, and WHERE clauses, no ordering or pagination.
pub fn compile_count(
    registry: &SchemaRegistry,
    expr: &QueryExpression,
) -> Result<CompiledQuery, UnsupportedQueryError> {
    Compiler::new(registry, expr)?.count()
}

/// One aliased table visible to column references.
struct ScopeEntry<'a> {
    alias: SqlIdentifier,
    descriptor: &'a EntityDescriptor,
}

struct Compiler<'a> {
    expr: &'a QueryExpression,
    root: &'a EntityDescriptor,
    scope: Vec<ScopeEntry<'a>>,
    join_sql: Vec<String>,
    binds: Vec<PgValue>,
    next_param: usize,
}

impl<'a> Compiler<'a> {
    fn new(
        registry: &'a SchemaRegistry,
        expr: &'a QueryExpression,
    ) -> Result<Self, UnsupportedQueryError> {
        let root = registry.resolve(&expr.entity)?;
        let root_alias = SqlIdentifier::new(&expr.alias)?;

        let mut compiler = Self {
            expr,
            root,
            scope: vec![ScopeEntry {
                alias: root_alias,
                descriptor: root,
            }],
            join_sql: Vec::new(),
            binds: Vec::new(),
            next_param: 1,
        };

        for join in &expr.joins {
            compiler.add_join(registry, join)?;
        }
        Ok(compiler)
    }

    fn add_join(
        &mut self,
        registry: &'a SchemaRegistry,
        join: &crate::expression::Join,
    ) -> Result<(), UnsupportedQueryError> {
        let alias = SqlIdentifier::new(&join.alias)?;
        if self.scope.iter().any(|e| e.alias == alias) {
            return Err(UnsupportedQueryError::DuplicateAlias {
                alias: join.alias.clone(),
            });
        }

        let rel = self.root.relationship(&join.relationship).ok_or_else(|| {
            UnsupportedQueryError::UnknownRelationship {
                entity: self.root.entity.clone(),
                relationship: join.relationship.clone(),
            }
        })?;
        let target = registry.resolve(&rel.target)?;
        let kind_sql = join.kind.to_sql();

        let root_alias = self.scope[0].alias.quoted();
        let target_pk = target
            .primary_key_fields()
            .first()
            .map(|f| f.name.quoted())
            .ok_or_else(|| UnsupportedQueryError::KeyWidthMismatch {
                entity: target.entity.clone(),
                expected: 1,
                actual: 0,
            })?;

        match &rel.kind {
            RelationshipKind::ManyToOne { fk_field } => {
                let fk = self.quoted_field(self.root, fk_field, &join.relationship)?;
                self.join_sql.push(format!(
                    "{} {} {} ON {}.{} = {}.{}",
                    kind_sql,
                    target.table.qualified(),
                    alias.quoted(),
                    root_alias,
                    fk,
                    alias.quoted(),
                    target_pk,
                ));
            }
            RelationshipKind::OneToMany { fk_field } => {
                let root_pk = self.root_pk_column()?;
                let fk = self.quoted_field(target, fk_field, &join.relationship)?;
                self.join_sql.push(format!(
                    "{} {} {} ON {}.{} = {}.{}",
                    kind_sql,
                    target.table.qualified(),
                    alias.quoted(),
                    alias.quoted(),
                    fk,
                    root_alias,
                    root_pk,
                ));
            }
            RelationshipKind::ManyToMany {
                join_table,
                left_fk,
                right_fk,
            } => {
                let root_pk = self.root_pk_column()?;
                let link_alias = SqlIdentifier::new(&format!("{}_jt", join.alias))?;
                let join_table = SqlIdentifier::new(join_table)?;
                let left_fk = SqlIdentifier::new(left_fk)?;
                let right_fk = SqlIdentifier::new(right_fk)?;
                self.join_sql.push(format!(
                    "{} {} {} ON {}.{} = {}.{}",
                    kind_sql,
                    join_table.quoted(),
                    link_alias.quoted(),
                    link_alias.quoted(),
                    left_fk.quoted(),
                    root_alias,
                    root_pk,
                ));
                self.join_sql.push(format!(
                    "{} {} {} ON {}.{} = {}.{}",
                    kind_sql,
                    target.table.qualified(),
                    alias.quoted(),
                    alias.quoted(),
                    target_pk,
                    link_alias.quoted(),
                    right_fk.quoted(),
                ));
            }
        }

        self.scope.push(ScopeEntry {
            alias,
            descriptor: target,
        });
        Ok(())
    }

    fn root_pk_column(&self) -> Result<String, UnsupportedQueryError> {
        let pk = self.root.primary_key_fields();
        if pk.len() != 1 {
            return Err(UnsupportedQueryError::KeyWidthMismatch {
                entity: self.root.entity.clone(),
                expected: 1,
                actual: pk.len(),
            });
        }
        Ok(pk[0].name.quoted())
    }

    fn quoted_field(
        &self,
        descriptor: &EntityDescriptor,
        field: &str,
        relationship: &str,
    ) -> Result<String, UnsupportedQueryError> {
        descriptor
            .field(field)
            .map(|f| f.name.quoted())
            .ok_or_else(|| UnsupportedQueryError::UnknownRelationship {
                entity: descriptor.entity.clone(),
                relationship: relationship.to_string(),
            })
    }

    /// Resolve a column reference to its alias-qualified, quoted form.
    fn qualify(&self, reference: &ColumnRef) -> Result<String, UnsupportedQueryError> {
        let entry = match &reference.alias {
            None => &self.scope[0],
            Some(alias) => self
                .scope
                .iter()
                .find(|e| e.alias.as_str() == alias)
                .ok_or_else(|| UnsupportedQueryError::UnknownAlias {
                    alias: alias.clone(),
                })?,
        };
        let field = entry.descriptor.field(&reference.column).ok_or_else(|| {
            UnsupportedQueryError::UnknownColumn {
                alias: entry.alias.as_str().to_string(),
                column: reference.column.clone(),
            }
        })?;
        Ok(format!("{}.{}", entry.alias.quoted(), field.name.quoted()))
    }

    fn push_bind(&mut self, value: PgValue) -> String {
        self.binds.push(value);
        let placeholder = format!("${}", self.next_param);
        self.next_param += 1;
        placeholder
    }

    fn select_list(&self) -> Result<String, UnsupportedQueryError> {
        match &self.expr.projection {
            Projection::All => {
                let root = &self.scope[0];
                Ok(root
                    .descriptor
                    .fields
                    .iter()
                    .map(|f| format!("{}.{}", root.alias.quoted(), f.name.quoted()))
                    .collect::<Vec<_>>()
                    .join(", "))
            }
            Projection::Columns(columns) => {
                let parts: Result<Vec<_>, _> =
                    columns.iter().map(|c| self.qualify(c)).collect();
                Ok(parts?.join(", "))
            }
        }
    }

    fn where_clause(&mut self) -> Result<String, UnsupportedQueryError> {
        if self.expr.filters.is_empty() {
            return Ok(String::new());
        }
        let filters = self.expr.filters.clone();
        let parts: Result<Vec<_>, _> = filters.iter().map(|f| self.filter_sql(f)).collect();
        Ok(format!(" WHERE {}", parts?.join(" AND ")))
    }

    fn filter_sql(&mut self, filter: &Filter) -> Result<String, UnsupportedQueryError> {
        match filter {
            Filter::Condition(condition) => self.condition_sql(condition),
            Filter::And(filters) => self.group_sql(filters, " AND "),
            Filter::Or(filters) => self.group_sql(filters, " OR "),
        }
    }

    fn group_sql(
        &mut self,
        filters: &[Filter],
        separator: &str,
    ) -> Result<String, UnsupportedQueryError> {
        let parts: Result<Vec<_>, _> = filters.iter().map(|f| self.filter_sql(f)).collect();
        Ok(format!("({})", parts?.join(separator)))
    }

    fn condition_sql(&mut self, condition: &Condition) -> Result<String, UnsupportedQueryError> {
        let column = self.qualify(&condition.column)?;
        let sql = match &condition.predicate {
            Predicate::Compare { op, value } => {
                let placeholder = self.push_bind(value.clone());
                format!("{} {} {}", column, op.to_sql(), placeholder)
            }
            Predicate::In { values } => {
                if values.is_empty() {
                    // Empty membership matches nothing.
                    "1=0".to_string()
                } else {
                    let placeholders: Vec<String> = values
                        .iter()
                        .map(|v| self.push_bind(v.clone()))
                        .collect();
                    format!("{} IN ({})", column, placeholders.join(", "))
                }
            }
            Predicate::NotIn { values } => {
                if values.is_empty() {
                    "1=1".to_string()
                } else {
                    let placeholders: Vec<String> = values
                        .iter()
                        .map(|v| self.push_bind(v.clone()))
                        .collect();
                    format!("{} NOT IN ({})", column, placeholders.join(", "))
                }
            }
            Predicate::IsNull => format!("{} IS NULL", column),
            Predicate::IsNotNull => format!("{} IS NOT NULL", column),
        };
        Ok(sql)
    }

    fn order_clause(&self) -> Result<String, UnsupportedQueryError> {
        if self.expr.order_by.is_empty() {
            return Ok(String::new());
        }
        let mut terms = Vec::with_capacity(self.expr.order_by.len());
        for item in &self.expr.order_by {
            let column = self.qualify(&item.column)?;
            let mut term = format!("{} {}", column, item.order.to_sql());
            if let Some(nulls) = item.nulls.to_sql() {
                term.push(' ');
                term.push_str(nulls);
            }
            terms.push(term);
        }
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }

    fn from_clause(&self) -> String {
        let root = &self.scope[0];
        let mut sql = format!(
            " FROM {} {}",
            root.descriptor.table.qualified(),
            root.alias.quoted()
        );
        for join in &self.join_sql {
            sql.push(' ');
            sql.push_str(join);
        }
        sql
    }

    fn select(mut self) -> Result<CompiledQuery, UnsupportedQueryError> {
        let select_list = self.select_list()?;
        let from = self.from_clause();
        let where_clause = self.where_clause()?;
        let order = self.order_clause()?;

        let mut sql = format!("SELECT {}{}{}{}", select_list, from, where_clause, order);
        if let Some(limit) = self.expr.limit {
            let placeholder = self.push_bind(PgValue::BigInt(limit));
            sql.push_str(&format!(" LIMIT {}", placeholder));
        }
        if let Some(offset) = self.expr.offset {
            let placeholder = self.push_bind(PgValue::BigInt(offset));
            sql.push_str(&format!(" OFFSET {}", placeholder));
        }

        tracing::debug!(entity = %self.expr.entity, sql = %sql, "compiled select");
        Ok(CompiledQuery {
            sql,
            binds: self.binds,
        })
    }

    fn count(mut self) -> Result<CompiledQuery, UnsupportedQueryError> {
        let from = self.from_clause();
        let where_clause = self.where_clause()?;
        let sql = format!("SELECT COUNT(*){}{}", from, where_clause);

        tracing::debug!(entity = %self.expr.entity, sql = %sql, "compiled count");
        Ok(CompiledQuery {
            sql,
            binds: self.binds,
        })
    }
}
