//! Result processor for resume-parse jobs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use jobtrail_core::ResumeId;
use jobtrail_tracker::{LinkOutcome, TimelineEvent, TimelineEventType};

use crate::jobs::{Job, JobOutcome, ResultError, ResultProcessor};
use crate::stores::{ResumeStore, TimelineStore};

/// Applies parse outcomes to the owning resume. Parse never enqueues a
/// follow-on; the structured extraction is pulled on demand when an
/// analysis needs it.
pub struct ParseResults {
    resumes: Arc<dyn ResumeStore>,
    timeline: Arc<dyn TimelineStore>,
}

impl ParseResults {
    pub fn new(resumes: Arc<dyn ResumeStore>, timeline: Arc<dyn TimelineStore>) -> Self {
        Self { resumes, timeline }
    }
}

#[async_trait]
impl ResultProcessor for ParseResults {
    async fn process_success(&self, job: &Job, outcome: &JobOutcome) -> Result<(), ResultError> {
        let JobOutcome::Parse { parsed_ref } = outcome else {
            warn!(job_id = %job.id, class = %outcome.class(), "parse results given a non-parse outcome; ignoring");
            return Ok(());
        };

        let resume_id = ResumeId::from_uuid(job.parent_ref);
        let Some(mut resume) = self.resumes.load(resume_id).await? else {
            info!(job_id = %job.id, resume_id = %resume_id, "parse completed for vanished resume; discarding");
            return Ok(());
        };
        if !resume.is_live() {
            info!(job_id = %job.id, resume_id = %resume_id, "parse completed for deleted resume; discarding");
            return Ok(());
        }

        if resume.link_parsed(*parsed_ref) == LinkOutcome::AlreadyLinked {
            debug!(job_id = %job.id, resume_id = %resume_id, "parsed data already linked; duplicate callback ignored");
            return Ok(());
        }
        self.resumes.update(&resume).await?;

        self.timeline
            .append(TimelineEvent::new(
                job.parent_ref,
                TimelineEventType::ResumeParsed,
                serde_json::json!({ "parsed_ref": parsed_ref }),
            ))
            .await?;
        info!(job_id = %job.id, resume_id = %resume_id, "resume parsed");
        Ok(())
    }

    async fn process_failure(&self, job: &Job) -> Result<(), ResultError> {
        let resume_id = ResumeId::from_uuid(job.parent_ref);
        let live = self
            .resumes
            .load(resume_id)
            .await?
            .is_some_and(|r| r.is_live());
        if !live {
            debug!(job_id = %job.id, resume_id = %resume_id, "parse failure for vanished resume; discarding");
            return Ok(());
        }

        self.timeline
            .append(TimelineEvent::new(
                job.parent_ref,
                TimelineEventType::ParseFailed,
                serde_json::json!({
                    "error_kind": job.error_kind,
                    "error": job.error_message,
                    "attempts": job.attempts,
                }),
            ))
            .await?;
        Ok(())
    }
}
