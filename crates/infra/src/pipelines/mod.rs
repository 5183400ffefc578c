//! Result processors: one per job class.
//!
//! Each turns a finished job into parent-entity and timeline mutations.
//! All three share the same discipline:
//!
//! - a vanished or soft-deleted parent is a discard, never an error
//! - a duplicate invocation is detected by comparing the parent's stored
//!   outcome link against the offered one and becomes a no-op
//! - they never retry anything themselves; the queue manager has already
//!   settled the job before they run

pub mod analyze;
pub mod fetch;
pub mod parse;

pub use analyze::AnalyzeResults;
pub use fetch::FetchResults;
pub use parse::ParseResults;

use crate::stores::StoreError;

use crate::jobs::ResultError;

impl From<StoreError> for ResultError {
    fn from(e: StoreError) -> Self {
        ResultError::Store(e.to_string())
    }
}
