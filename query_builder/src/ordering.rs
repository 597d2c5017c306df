//! Ordering clauses

use crate::expression::ColumnRef;

#[derive(Debug, Clone, PartialEq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Where NULL sorts relative to non-null values. `Default` leaves the
/// choice to PostgreSQL (nulls last for ASC, first for DESC).
#[derive(Debug, Clone, PartialEq)]
pub enum NullsPlacement {
    Default,
    First,
    Last,
}

impl NullsPlacement {
    pub fn to_sql(&self) -> Option<&'static str> {
        match self {
            NullsPlacement::Default => None,
            NullsPlacement::First => Some("NULLS FIRST"),
            NullsPlacement::Last => Some("NULLS LAST"),
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub order: SortOrder,
    pub nulls: NullsPlacement,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: ColumnRef::parse(column),
            order: SortOrder::Asc,
            nulls: NullsPlacement::Default,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: ColumnRef::parse(column),
            order: SortOrder::Desc,
            nulls: NullsPlacement::Default,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullsPlacement::First;
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullsPlacement::Last;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_to_sql() {
        assert_eq!(SortOrder::Asc.to_sql(), "ASC");
        assert_eq!(SortOrder::Desc.to_sql(), "DESC");
    }

    #[test]
    fn test_nulls_placement() {
        assert_eq!(NullsPlacement::Default.to_sql(), None);
        assert_eq!(NullsPlacement::Last.to_sql(), Some("NULLS LAST"));
        let order = OrderBy::asc("published_at").nulls_last();
        assert_eq!(order.nulls, NullsPlacement::Last);
    }
}
