//! `jobtrail-tracker` — parent-entity domain types.
//!
//! The records the background pipelines act on behalf of: tracked
//! applications, uploaded resumes, and their audit timeline.

pub mod application;
pub mod resume;
pub mod timeline;

pub use application::{
    Application, ApplicationSource, ApplicationStatus, LinkOutcome, UNKNOWN_COMPANY, UNKNOWN_TITLE,
};
pub use resume::Resume;
pub use timeline::{TimelineEvent, TimelineEventType};
