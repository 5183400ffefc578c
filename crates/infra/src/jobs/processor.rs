//! Seams between the queue engine and the external executors.
//!
//! A `Processor` performs the class's actual work (HTTP retrieval, document
//! parsing, LLM calls) and persists its own artifact; the queue only sees
//! the resulting reference. A `ResultProcessor` turns a finished job into
//! parent-entity and timeline mutations.

use async_trait::async_trait;
use uuid::Uuid;

use jobtrail_core::{AnalysisId, PostingId};

use super::types::{ErrorKind, Job, JobClass};

/// Class-specific successful output, carrying the reference to the stored
/// artifact plus the fields result processors need for backfill and audit.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum JobOutcome {
    Fetch {
        posting_id: PostingId,
        title: Option<String>,
        company: Option<String>,
        /// Extraction left gaps; the application keeps its review flag.
        partial: bool,
    },
    Parse {
        parsed_ref: Uuid,
    },
    Analyze {
        analysis_id: AnalysisId,
        match_score: Option<u8>,
    },
}

impl JobOutcome {
    pub fn class(&self) -> JobClass {
        match self {
            JobOutcome::Fetch { .. } => JobClass::Fetch,
            JobOutcome::Parse { .. } => JobClass::Parse,
            JobOutcome::Analyze { .. } => JobClass::Analyze,
        }
    }

    /// The opaque reference reported to `report_success`.
    pub fn result_ref(&self) -> Uuid {
        match self {
            JobOutcome::Fetch { posting_id, .. } => *posting_id.as_uuid(),
            JobOutcome::Parse { parsed_ref } => *parsed_ref,
            JobOutcome::Analyze { analysis_id, .. } => *analysis_id.as_uuid(),
        }
    }
}

/// Classified processor failure. Anything a processor raises is folded into
/// this before it reaches the queue manager's bookkeeping path.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProcessorError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProcessorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classification fallback: terminal, never retried.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

/// External executor for one job class.
#[async_trait]
pub trait Processor: Send + Sync {
    fn class(&self) -> JobClass;

    /// Execute the job's payload. Implementations persist their artifact and
    /// return its reference; they must classify every failure.
    async fn run(&self, job: &Job) -> Result<JobOutcome, ProcessorError>;
}

/// Failure from a result processor's store writes.
///
/// Never reverts the job's state: the job outcome and the parent outcome may
/// diverge under failure, and consistency is restored by re-reading job
/// history on the next user action.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResultError {
    #[error("store error: {0}")]
    Store(String),
}

/// Turns finished jobs into parent-entity and timeline mutations.
#[async_trait]
pub trait ResultProcessor: Send + Sync {
    /// Apply a successful outcome: write the outcome link onto the parent,
    /// append a timeline entry, optionally enqueue a follow-on job.
    ///
    /// Must tolerate a vanished parent (discard, not error) and a duplicate
    /// invocation for the same `(job, outcome)` (no-op).
    async fn process_success(&self, job: &Job, outcome: &JobOutcome) -> Result<(), ResultError>;

    /// Record a permanent failure on the parent's timeline. Retries have
    /// already been exhausted by the queue manager before this is reached.
    async fn process_failure(&self, job: &Job) -> Result<(), ResultError>;
}
