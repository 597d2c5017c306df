//! Session and unit of work for rowmap
//!
//! A session is the per-logical-operation context: it owns one
//! database transaction for its whole lifetime, deduplicates loaded
//! rows through an identity map, tracks new/dirty/deleted instances,
//! and flushes pending changes in foreign-key dependency order.

pub mod errors;
pub mod executor;
pub mod hydrate;
pub mod identity;
pub mod instance;
pub mod query;
pub mod raw;
pub mod savepoint;
pub mod session;
pub mod unit_of_work;

pub use errors::{ConstraintKind, HydrationError, SessionError};
pub use hydrate::{dehydrate, HydrationMode};
pub use identity::IdentityMap;
pub use instance::{Instance, InstanceRef};
pub use query::{EntityQuery, Page};
pub use savepoint::Savepoint;
pub use session::{Session, SessionState};
pub use unit_of_work::{FlushPlan, PendingChanges, PlannedKind, PlannedStatement};
