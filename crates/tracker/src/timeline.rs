//! Audit/timeline model.
//!
//! Every pipeline outcome that is visible to the user lands here as an
//! append-only event attached to the parent record. The `parent_ref` is a
//! plain UUID so applications and resumes share one timeline store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEventType {
    ApplicationCreated,
    ApplicationDeleted,
    PostingLinked,
    FetchFailed,
    ResumeParsed,
    ParseFailed,
    AnalysisCompleted,
    AnalysisFailed,
}

impl TimelineEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineEventType::ApplicationCreated => "application_created",
            TimelineEventType::ApplicationDeleted => "application_deleted",
            TimelineEventType::PostingLinked => "posting_linked",
            TimelineEventType::FetchFailed => "fetch_failed",
            TimelineEventType::ResumeParsed => "resume_parsed",
            TimelineEventType::ParseFailed => "parse_failed",
            TimelineEventType::AnalysisCompleted => "analysis_completed",
            TimelineEventType::AnalysisFailed => "analysis_failed",
        }
    }
}

impl core::fmt::Display for TimelineEventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub parent_ref: Uuid,
    pub event_type: TimelineEventType,
    pub data: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl TimelineEvent {
    pub fn new(parent_ref: Uuid, event_type: TimelineEventType, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            parent_ref,
            event_type,
            data,
            occurred_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_serde() {
        let json = serde_json::to_string(&TimelineEventType::PostingLinked).unwrap();
        assert_eq!(json, "\"posting_linked\"");
        let back: TimelineEventType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TimelineEventType::PostingLinked);
    }
}
