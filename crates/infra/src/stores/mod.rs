//! Parent-entity and timeline stores.
//!
//! The queue engine never touches these directly; result processors and the
//! HTTP layer do. In-memory implementations back tests and single-process
//! deployments.

pub mod applications;
pub mod resumes;
pub mod timeline;

pub use applications::{ApplicationStore, InMemoryApplicationStore};
pub use resumes::{InMemoryResumeStore, ResumeStore};
pub use timeline::{InMemoryTimelineStore, TimelineStore};

/// Store error shared by the parent-entity and timeline stores.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}
