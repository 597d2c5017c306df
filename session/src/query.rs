//! Session-level entity queries
//!
//! A thin wrapper binding a query expression to the session that will
//! execute and hydrate it, so every returned row passes through the
//! identity map.

use query_builder::{Filter, OrderBy, QueryExpression, SortOrder};

use crate::errors::SessionError;
use crate::instance::InstanceRef;
use crate::session::Session;

/// One window of results from [`EntityQuery::paginate`].
#[derive(Debug)]
pub struct Page {
    pub items: Vec<InstanceRef>,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

/// A query over one entity, executed through a session.
pub struct EntityQuery<'s> {
    session: &'s mut Session,
    expr: QueryExpression,
}

impl<'s> EntityQuery<'s> {
    pub(crate) fn new(session: &'s mut Session, entity: &str, alias: &str) -> Self {
        Self {
            session,
            expr: QueryExpression::new(entity, alias),
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.expr = self.expr.columns(columns);
        self
    }

    pub fn join(mut self, relationship: &str, alias: &str) -> Self {
        self.expr = self.expr.join(relationship, alias);
        self
    }

    pub fn left_join(mut self, relationship: &str, alias: &str) -> Self {
        self.expr = self.expr.left_join(relationship, alias);
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.expr = self.expr.filter(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.expr = self.expr.order_by(order);
        self
    }

    pub fn order_by_column(mut self, column: &str, order: SortOrder) -> Self {
        self.expr = self.expr.order_by_column(column, order);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.expr = self.expr.limit(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.expr = self.expr.offset(offset);
        self
    }

    /// The expression as built so far.
    pub fn expression(&self) -> &QueryExpression {
        &self.expr
    }

    pub async fn fetch(self) -> Result<Vec<InstanceRef>, SessionError> {
        self.session.fetch(self.expr).await
    }

    pub async fn fetch_one(self) -> Result<Option<InstanceRef>, SessionError> {
        self.session.fetch_one(self.expr).await
    }

    pub async fn count(self) -> Result<i64, SessionError> {
        self.session.count(self.expr).await
    }

    /// Fetch one offset window of `page_size` rows. Overshoots by one
    /// row to learn whether a following page exists.
    pub async fn paginate(self, page_size: i64, offset: i64) -> Result<Page, SessionError> {
        self.session.paginate(self.expr, page_size, offset).await
    }
}
