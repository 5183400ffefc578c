//! Request DTOs and JSON mapping helpers.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};

use jobtrail_core::ResumeId;
use jobtrail_infra::jobs::{Job, QueueStatus};
use jobtrail_tracker::{Application, ApplicationSource, Resume, TimelineEvent};

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_title: String,
    pub posting_url: Option<String>,
    pub applied_on: NaiveDate,
    #[serde(default = "default_source")]
    pub source: ApplicationSource,
    pub notes: Option<String>,
    #[serde(default)]
    pub auto_analyze: bool,
    pub resume_id: Option<ResumeId>,
    /// Queue priority for the posting fetch; higher claims first.
    #[serde(default)]
    pub priority: i32,
}

fn default_source() -> ApplicationSource {
    ApplicationSource::Manual
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: jobtrail_tracker::ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueAnalysisRequest {
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateResumeRequest {
    pub original_name: String,
    pub file_path: String,
    #[serde(default)]
    pub priority: i32,
}

pub fn application_to_json(app: &Application) -> Value {
    json!({
        "id": app.id,
        "company_name": app.company_name,
        "job_title": app.job_title,
        "posting_url": app.posting_url,
        "applied_on": app.applied_on,
        "source": app.source,
        "status": app.status,
        "notes": app.notes,
        "needs_review": app.needs_review,
        "auto_analyze": app.auto_analyze,
        "posting_id": app.posting_id,
        "analysis_id": app.analysis_id,
        "resume_id": app.resume_id,
        "created_at": app.created_at,
        "updated_at": app.updated_at,
    })
}

pub fn resume_to_json(resume: &Resume) -> Value {
    json!({
        "id": resume.id,
        "original_name": resume.original_name,
        "file_path": resume.file_path,
        "uploaded_at": resume.uploaded_at,
        "parsed_ref": resume.parsed_ref,
        "updated_at": resume.updated_at,
    })
}

pub fn job_to_json(job: &Job) -> Value {
    json!({
        "id": job.id,
        "class": job.class(),
        "parent_ref": job.parent_ref,
        "payload": job.payload,
        "priority": job.priority,
        "status": job.status,
        "attempts": job.attempts,
        "max_attempts": job.max_attempts,
        "retry_after": job.retry_after,
        "error_kind": job.error_kind,
        "error_message": job.error_message,
        "started_at": job.started_at,
        "completed_at": job.completed_at,
        "created_at": job.created_at,
    })
}

pub fn event_to_json(event: &TimelineEvent) -> Value {
    json!({
        "id": event.id,
        "event_type": event.event_type,
        "data": event.data,
        "occurred_at": event.occurred_at,
    })
}

pub fn queue_status_to_json(status: &QueueStatus) -> Value {
    json!({
        "class": status.class,
        "pending": status.pending,
        "processing": status.processing,
        "complete": status.complete,
        "failed": status.failed,
        "oldest_pending_secs": status.oldest_pending_secs,
    })
}
