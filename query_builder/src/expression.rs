//! Query expressions
//!
//! The intermediate representation a query is built up in before
//! compilation. Built incrementally by value-consuming builder methods;
//! compilation reads it immutably, so compiled SQL never reflects later
//! changes.

use crate::filter::Filter;
use crate::ordering::{OrderBy, SortOrder};

/// Reference to a column, optionally qualified by a table alias.
/// Unqualified references resolve against the query's root entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub alias: Option<String>,
    pub column: String,
}

impl ColumnRef {
    /// Parse `"col"` or `"alias.col"`.
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('.') {
            Some((alias, column)) => Self {
                alias: Some(alias.to_string()),
                column: column.to_string(),
            },
            None => Self {
                alias: None,
                column: reference.to_string(),
            },
        }
    }
}

/// What the SELECT list carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// Every declared column of the root entity.
    All,
    /// An explicit column subset; hydration of the result must be
    /// configured for partial rows.
    Columns(Vec<ColumnRef>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// A join derived from a declared relationship of the root entity.
/// The join condition is taken from the relationship metadata, never
/// from caller-supplied SQL text.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub relationship: String,
    pub alias: String,
    pub kind: JoinKind,
}

/// An immutable-once-compiled query over one root entity.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpression {
    pub entity: String,
    pub alias: String,
    pub projection: Projection,
    pub joins: Vec<Join>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl QueryExpression {
    pub fn new(entity: &str, alias: &str) -> Self {
        Self {
            entity: entity.to_string(),
            alias: alias.to_string(),
            projection: Projection::All,
            joins: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Project an explicit column subset instead of all root columns.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.projection = Projection::Columns(columns.iter().map(|c| ColumnRef::parse(c)).collect());
        self
    }

    /// Join a related entity through a declared relationship.
    pub fn join(mut self, relationship: &str, alias: &str) -> Self {
        self.joins.push(Join {
            relationship: relationship.to_string(),
            alias: alias.to_string(),
            kind: JoinKind::Inner,
        });
        self
    }

    /// Left-join a related entity through a declared relationship.
    pub fn left_join(mut self, relationship: &str, alias: &str) -> Self {
        self.joins.push(Join {
            relationship: relationship.to_string(),
            alias: alias.to_string(),
            kind: JoinKind::Left,
        });
        self
    }

    /// Add a filter; multiple filters combine with AND.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn order_by_column(self, column: &str, order: SortOrder) -> Self {
        let term = match order {
            SortOrder::Asc => OrderBy::asc(column),
            SortOrder::Desc => OrderBy::desc(column),
        };
        self.order_by(term)
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    #[test]
    fn test_column_ref_parse() {
        let plain = ColumnRef::parse("title");
        assert_eq!(plain.alias, None);
        assert_eq!(plain.column, "title");

        let qualified = ColumnRef::parse("bp.title");
        assert_eq!(qualified.alias.as_deref(), Some("bp"));
        assert_eq!(qualified.column, "title");
    }

    #[test]
    fn test_builder_accumulates() {
        let expr = QueryExpression::new("post", "p")
            .left_join("comments", "c")
            .filter(Filter::eq("title", "First"))
            .order_by(OrderBy::desc("p.id"))
            .limit(10)
            .offset(20);

        assert_eq!(expr.joins.len(), 1);
        assert_eq!(expr.joins[0].kind, JoinKind::Left);
        assert_eq!(expr.filters.len(), 1);
        assert_eq!(expr.order_by.len(), 1);
        assert_eq!(expr.limit, Some(10));
        assert_eq!(expr.offset, Some(20));
    }
}
