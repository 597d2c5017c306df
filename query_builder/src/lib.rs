//! Query building for rowmap
//!
//! Constructs an intermediate query representation (selects, filters,
//! joins, ordering, pagination and the write statements) and compiles
//! it to parameterized SQL plus an ordered bind-value sequence. No
//! application value is ever interpolated into SQL text.

pub mod compile;
pub mod errors;
pub mod expression;
pub mod filter;
pub mod ordering;
pub mod writes;

pub use compile::{compile_count, compile_select, CompiledQuery};
pub use errors::UnsupportedQueryError;
pub use expression::{ColumnRef, Join, JoinKind, Projection, QueryExpression};
pub use filter::{Comparison, Condition, Filter, Predicate};
pub use ordering::{NullsPlacement, OrderBy, SortOrder};
pub use writes::{
    compile_delete, compile_delete_by_fk, compile_delete_join_rows, compile_insert,
    compile_select_by_fk, compile_select_by_key, compile_select_by_keys,
    compile_select_via_join_table, compile_update,
};
