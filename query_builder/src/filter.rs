//! Filter tree
//!
//! Predicate nodes for WHERE clauses: comparisons, conjunction,
//! disjunction, membership, and null checks. Values are carried as
//! `PgValue`s and only ever leave as bind parameters.

use type_coercion::PgValue;

use crate::expression::ColumnRef;

/// Comparison operators over a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    ILike,
}

impl Comparison {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Like => "LIKE",
            Comparison::ILike => "ILIKE",
        }
    }
}

/// The predicate applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { op: Comparison, value: PgValue },
    In { values: Vec<PgValue> },
    NotIn { values: Vec<PgValue> },
    IsNull,
    IsNotNull,
}

/// Single condition in a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: ColumnRef,
    pub predicate: Predicate,
}

/// A filter tree that can be nested arbitrarily.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Condition(Condition),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    fn compare(column: &str, op: Comparison, value: impl Into<PgValue>) -> Self {
        Filter::Condition(Condition {
            column: ColumnRef::parse(column),
            predicate: Predicate::Compare {
                op,
                value: value.into(),
            },
        })
    }

    pub fn eq(column: &str, value: impl Into<PgValue>) -> Self {
        Self::compare(column, Comparison::Eq, value)
    }

    pub fn ne(column: &str, value: impl Into<PgValue>) -> Self {
        Self::compare(column, Comparison::Ne, value)
    }

    pub fn gt(column: &str, value: impl Into<PgValue>) -> Self {
        Self::compare(column, Comparison::Gt, value)
    }

    pub fn gte(column: &str, value: impl Into<PgValue>) -> Self {
        Self::compare(column, Comparison::Gte, value)
    }

    pub fn lt(column: &str, value: impl Into<PgValue>) -> Self {
        Self::compare(column, Comparison::Lt, value)
    }

    pub fn lte(column: &str, value: impl Into<PgValue>) -> Self {
        Self::compare(column, Comparison::Lte, value)
    }

    pub fn like(column: &str, pattern: &str) -> Self {
        Self::compare(column, Comparison::Like, pattern)
    }

    pub fn ilike(column: &str, pattern: &str) -> Self {
        Self::compare(column, Comparison::ILike, pattern)
    }

    pub fn in_values(column: &str, values: Vec<PgValue>) -> Self {
        Filter::Condition(Condition {
            column: ColumnRef::parse(column),
            predicate: Predicate::In { values },
        })
    }

    pub fn not_in_values(column: &str, values: Vec<PgValue>) -> Self {
        Filter::Condition(Condition {
            column: ColumnRef::parse(column),
            predicate: Predicate::NotIn { values },
        })
    }

    pub fn is_null(column: &str) -> Self {
        Filter::Condition(Condition {
            column: ColumnRef::parse(column),
            predicate: Predicate::IsNull,
        })
    }

    pub fn is_not_null(column: &str) -> Self {
        Filter::Condition(Condition {
            column: ColumnRef::parse(column),
            predicate: Predicate::IsNotNull,
        })
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_constructors() {
        let filter = Filter::eq("email", "a@x.com");
        match filter {
            Filter::Condition(cond) => {
                assert_eq!(cond.column.column, "email");
                assert_eq!(cond.column.alias, None);
                assert_eq!(
                    cond.predicate,
                    Predicate::Compare {
                        op: Comparison::Eq,
                        value: PgValue::Text("a@x.com".into())
                    }
                );
            }
            _ => panic!("expected Condition"),
        }
    }

    #[test]
    fn test_qualified_column_reference() {
        let filter = Filter::gt("c.created_at", 5i64);
        match filter {
            Filter::Condition(cond) => {
                assert_eq!(cond.column.alias.as_deref(), Some("c"));
                assert_eq!(cond.column.column, "created_at");
            }
            _ => panic!("expected Condition"),
        }
    }

    #[test]
    fn test_null_checks_carry_no_value() {
        assert!(matches!(
            Filter::is_null("rating"),
            Filter::Condition(Condition {
                predicate: Predicate::IsNull,
                ..
            })
        ));
        assert!(matches!(
            Filter::is_not_null("rating"),
            Filter::Condition(Condition {
                predicate: Predicate::IsNotNull,
                ..
            })
        ));
    }

    #[test]
    fn test_nested_groups() {
        let filter = Filter::and(vec![
            Filter::or(vec![
                Filter::eq("status", "open"),
                Filter::eq("status", "pending"),
            ]),
            Filter::gt("rating", 3i32),
        ]);
        assert!(matches!(filter, Filter::And(ref inner) if inner.len() == 2));
    }
}
