//! Savepoints
//!
//! Nested transaction requests inside an open session transaction
//! become savepoints: rolling back to one undoes only the work since
//! it was created.

/// A named savepoint inside the session's transaction. Names are
/// generated by the session (`sp_1`, `sp_2`, ...) and never contain
/// caller input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    pub(crate) fn new(index: u32) -> Self {
        Self {
            name: format!("sp_{}", index),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
