//! Time-to-live expiration of audit documents.
//!
//! Each cycle flows leaves-first through this module:
//!
//! 1. [`RetentionPolicy`] turns "now" into a cutoff instant
//! 2. [`ExpiryPredicate`] selects expirable statuses processed at or before
//!    the cutoff
//! 3. [`BulkReaper`] deletes every match through the messages view index
//! 4. [`ExpirationScheduler`] repeats this on a timer, one cycle at a time

mod policy;
mod predicate;
mod reaper;
mod scheduler;

pub use policy::RetentionPolicy;
pub use predicate::ExpiryPredicate;
pub use reaper::{BulkReaper, ReapError, ReapOutcome};
pub use scheduler::{ExpirationScheduler, SchedulerState, SchedulerStats};
