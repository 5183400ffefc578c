use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use jobtrail_core::{AnalysisId, ApplicationId, PostingId, ResumeId};

/// Placeholder values used when a capture arrives before the posting is fetched.
pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_TITLE: &str = "Unknown Position";

/// Where an application record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationSource {
    Manual,
    BrowserCapture,
    EmailImport,
}

/// Application status lifecycle (user-driven, not touched by the pipelines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Screening,
    Interviewing,
    Offer,
    Rejected,
    Withdrawn,
}

/// Outcome of writing a denormalized link onto the parent.
///
/// `AlreadyLinked` is how result processors detect a duplicate callback:
/// the parent already reflects this exact outcome, so the second call is a
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
}

/// Parent entity: one tracked job application.
///
/// Owns the denormalized outcome references written by result processors
/// (`posting_id`, `analysis_id`). Soft-deleted applications stay readable
/// but are treated as absent by the pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub company_name: String,
    pub job_title: String,
    pub posting_url: Option<String>,
    pub applied_on: NaiveDate,
    pub source: ApplicationSource,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
    /// Capture produced placeholder fields that a fetch should fill in.
    pub needs_review: bool,
    /// Auto-follow-on: a successful fetch enqueues a match analysis.
    pub auto_analyze: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub posting_id: Option<PostingId>,
    pub analysis_id: Option<AnalysisId>,
    pub resume_id: Option<ResumeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        company_name: impl Into<String>,
        job_title: impl Into<String>,
        posting_url: Option<String>,
        applied_on: NaiveDate,
        source: ApplicationSource,
    ) -> Self {
        let now = Utc::now();
        let company_name = non_empty_or(company_name.into(), UNKNOWN_COMPANY);
        let job_title = non_empty_or(job_title.into(), UNKNOWN_TITLE);
        let needs_review = company_name == UNKNOWN_COMPANY || job_title == UNKNOWN_TITLE;

        Self {
            id: ApplicationId::new(),
            company_name,
            job_title,
            posting_url,
            applied_on,
            source,
            status: ApplicationStatus::Applied,
            notes: None,
            needs_review,
            auto_analyze: false,
            is_deleted: false,
            deleted_at: None,
            posting_id: None,
            analysis_id: None,
            resume_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_auto_analyze(mut self, enabled: bool) -> Self {
        self.auto_analyze = enabled;
        self
    }

    pub fn with_resume(mut self, resume_id: ResumeId) -> Self {
        self.resume_id = Some(resume_id);
        self
    }

    /// Whether the pipelines may still mutate this record.
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }

    pub fn soft_delete(&mut self) {
        if self.is_deleted {
            return;
        }
        let now = Utc::now();
        self.is_deleted = true;
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    /// Write the fetched-posting link. Re-fetching replaces an older link.
    pub fn link_posting(&mut self, posting_id: PostingId) -> LinkOutcome {
        if self.posting_id == Some(posting_id) {
            return LinkOutcome::AlreadyLinked;
        }
        self.posting_id = Some(posting_id);
        self.touch();
        LinkOutcome::Linked
    }

    /// Write the analysis link. Re-analysis replaces an older link.
    pub fn link_analysis(&mut self, analysis_id: AnalysisId) -> LinkOutcome {
        if self.analysis_id == Some(analysis_id) {
            return LinkOutcome::AlreadyLinked;
        }
        self.analysis_id = Some(analysis_id);
        self.touch();
        LinkOutcome::Linked
    }

    /// Fill placeholder company/title from a fetched posting and clear
    /// `needs_review` once both fields carry real values.
    pub fn backfill_from_posting(&mut self, company: Option<&str>, title: Option<&str>) {
        if self.company_name == UNKNOWN_COMPANY {
            if let Some(c) = company.filter(|c| !c.trim().is_empty()) {
                self.company_name = c.to_string();
            }
        }
        if self.job_title == UNKNOWN_TITLE {
            if let Some(t) = title.filter(|t| !t.trim().is_empty()) {
                self.job_title = t.to_string();
            }
        }
        if self.company_name != UNKNOWN_COMPANY && self.job_title != UNKNOWN_TITLE {
            self.needs_review = false;
        }
        self.touch();
    }

    pub fn set_status(&mut self, status: ApplicationStatus) {
        self.status = status;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_with(company: &str, title: &str) -> Application {
        Application::new(
            company,
            title,
            Some("https://example.com/job/1".to_string()),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            ApplicationSource::BrowserCapture,
        )
    }

    #[test]
    fn blank_capture_gets_placeholders_and_review_flag() {
        let app = app_with("", "");
        assert_eq!(app.company_name, UNKNOWN_COMPANY);
        assert_eq!(app.job_title, UNKNOWN_TITLE);
        assert!(app.needs_review);
    }

    #[test]
    fn link_posting_is_idempotent() {
        let mut app = app_with("Acme", "Engineer");
        let posting = PostingId::new();

        assert_eq!(app.link_posting(posting), LinkOutcome::Linked);
        assert_eq!(app.link_posting(posting), LinkOutcome::AlreadyLinked);

        // A re-fetch producing a different posting replaces the link.
        let other = PostingId::new();
        assert_eq!(app.link_posting(other), LinkOutcome::Linked);
        assert_eq!(app.posting_id, Some(other));
    }

    #[test]
    fn backfill_clears_review_flag_when_complete() {
        let mut app = app_with("", "");
        app.backfill_from_posting(Some("Acme"), None);
        assert!(app.needs_review);

        app.backfill_from_posting(None, Some("Engineer"));
        assert!(!app.needs_review);
        assert_eq!(app.company_name, "Acme");
        assert_eq!(app.job_title, "Engineer");
    }

    #[test]
    fn backfill_never_overwrites_user_provided_fields() {
        let mut app = app_with("Acme", "Engineer");
        app.backfill_from_posting(Some("Other Corp"), Some("Manager"));
        assert_eq!(app.company_name, "Acme");
        assert_eq!(app.job_title, "Engineer");
    }

    #[test]
    fn soft_delete_marks_and_timestamps() {
        let mut app = app_with("Acme", "Engineer");
        assert!(app.is_live());

        app.soft_delete();
        assert!(!app.is_live());
        assert!(app.deleted_at.is_some());

        let deleted_at = app.deleted_at;
        app.soft_delete();
        assert_eq!(app.deleted_at, deleted_at);
    }
}
