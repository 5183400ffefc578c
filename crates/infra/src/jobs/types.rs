//! Core job record types and state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobtrail_core::{DomainError, JobId, PostingId, ResumeId};

/// Pipeline a job belongs to. Determines its payload shape, processor, and
/// retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClass {
    /// Retrieve + extract a job posting from its URL.
    Fetch,
    /// Extract structured text from an uploaded resume.
    Parse,
    /// LLM match analysis of an application.
    Analyze,
}

impl JobClass {
    pub const ALL: [JobClass; 3] = [JobClass::Fetch, JobClass::Parse, JobClass::Analyze];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobClass::Fetch => "fetch",
            JobClass::Parse => "parse",
            JobClass::Analyze => "analyze",
        }
    }

    /// Attempt budget per class. Parse is single-shot: any failure is final.
    pub fn max_attempts(&self) -> u32 {
        match self {
            JobClass::Fetch => 3,
            JobClass::Parse => 1,
            JobClass::Analyze => 3,
        }
    }
}

impl core::fmt::Display for JobClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for JobClass {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetch" => Ok(JobClass::Fetch),
            "parse" => Ok(JobClass::Parse),
            "analyze" => Ok(JobClass::Analyze),
            other => Err(DomainError::validation(format!(
                "unknown job class: {other}"
            ))),
        }
    }
}

/// Failure taxonomy reported by processors and the watchdog.
///
/// Transient-infrastructure kinds may be retried per the class policy;
/// permanent-content kinds are always terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Timeout,
    ConnectionError,
    ServerError,
    RateLimited,
    NotFound,
    Forbidden,
    TlsError,
    RedirectLoop,
    UnsupportedContent,
    CorruptedFile,
    MalformedResponse,
    MissingPrecondition,
    InvalidCredential,
    /// Watchdog-detected: a worker claimed the job and never reported back.
    WorkerAbandoned,
    /// Classification fallback. Terminal, to avoid infinite retry loops.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConnectionError => "connection-error",
            ErrorKind::ServerError => "server-error",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::TlsError => "tls-error",
            ErrorKind::RedirectLoop => "redirect-loop",
            ErrorKind::UnsupportedContent => "unsupported-content",
            ErrorKind::CorruptedFile => "corrupted-file",
            ErrorKind::MalformedResponse => "malformed-response",
            ErrorKind::MissingPrecondition => "missing-precondition",
            ErrorKind::InvalidCredential => "invalid-credential",
            ErrorKind::WorkerAbandoned => "worker-abandoned",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ErrorKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timeout" => Ok(ErrorKind::Timeout),
            "connection-error" => Ok(ErrorKind::ConnectionError),
            "server-error" => Ok(ErrorKind::ServerError),
            "rate-limited" => Ok(ErrorKind::RateLimited),
            "not-found" => Ok(ErrorKind::NotFound),
            "forbidden" => Ok(ErrorKind::Forbidden),
            "tls-error" => Ok(ErrorKind::TlsError),
            "redirect-loop" => Ok(ErrorKind::RedirectLoop),
            "unsupported-content" => Ok(ErrorKind::UnsupportedContent),
            "corrupted-file" => Ok(ErrorKind::CorruptedFile),
            "malformed-response" => Ok(ErrorKind::MalformedResponse),
            "missing-precondition" => Ok(ErrorKind::MissingPrecondition),
            "invalid-credential" => Ok(ErrorKind::InvalidCredential),
            "worker-abandoned" => Ok(ErrorKind::WorkerAbandoned),
            "unknown" => Ok(ErrorKind::Unknown),
            other => Err(DomainError::validation(format!(
                "unknown error kind: {other}"
            ))),
        }
    }
}

/// Class-specific job input. Immutable after enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum JobPayload {
    Fetch {
        url: String,
    },
    Parse {
        file_path: String,
    },
    Analyze {
        posting_id: Option<PostingId>,
        resume_id: Option<ResumeId>,
    },
}

impl JobPayload {
    pub fn class(&self) -> JobClass {
        match self {
            JobPayload::Fetch { .. } => JobClass::Fetch,
            JobPayload::Parse { .. } => JobClass::Parse,
            JobPayload::Analyze { .. } => JobClass::Analyze,
        }
    }
}

/// Job execution status. `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }
}

impl core::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::validation(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

/// One persisted background job.
///
/// Mutated only by the `QueueManager`. Higher `priority` dequeues first,
/// ties broken by earliest `created_at`. `retry_after` is only meaningful
/// while the job is `Pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// The entity this job acts on: an application for fetch/analyze, a
    /// resume for parse. May dangle; result processors re-check.
    pub parent_ref: Uuid,
    pub payload: JobPayload,
    pub priority: i32,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub retry_after: Option<DateTime<Utc>>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(parent_ref: Uuid, payload: JobPayload, priority: i32) -> Self {
        let max_attempts = payload.class().max_attempts();
        Self {
            id: JobId::new(),
            parent_ref,
            payload,
            priority,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            retry_after: None,
            error_kind: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn class(&self) -> JobClass {
        self.payload.class()
    }

    /// Whether a dequeuer may claim this job right now.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.retry_after.is_none_or(|t| t <= now)
    }

    /// Claim transition: pending → processing.
    pub fn begin(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        self.completed_at = None;
        self.retry_after = None;
    }

    /// Terminal success transition.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Complete;
        self.completed_at = Some(now);
        self.retry_after = None;
        self.error_kind = None;
        self.error_message = None;
    }

    /// Count one failed attempt. Saturates at `max_attempts`; duplicate
    /// failure reports must not break the attempt-budget invariant.
    pub fn record_attempt(&mut self) {
        self.attempts = (self.attempts + 1).min(self.max_attempts);
    }

    /// Retry transition: back to pending with a future eligibility time.
    pub fn reschedule(&mut self, kind: ErrorKind, message: String, retry_after: DateTime<Utc>) {
        self.status = JobStatus::Pending;
        self.retry_after = Some(retry_after);
        self.error_kind = Some(kind);
        self.error_message = Some(message);
        self.started_at = None;
        self.completed_at = None;
    }

    /// Terminal failure transition.
    pub fn fail(&mut self, kind: ErrorKind, message: String, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(now);
        self.retry_after = None;
        self.error_kind = Some(kind);
        self.error_message = Some(message);
    }
}
