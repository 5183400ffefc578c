//! Result processor for posting-fetch jobs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use jobtrail_core::ApplicationId;
use jobtrail_tracker::{LinkOutcome, TimelineEvent, TimelineEventType};

use crate::jobs::{
    Job, JobOutcome, JobPayload, JobStore, QueueManager, ResultError, ResultProcessor,
};
use crate::stores::{ApplicationStore, TimelineStore};

/// Applies fetch outcomes to the owning application: links the posting,
/// backfills placeholder fields, and enqueues the follow-on analysis when
/// the application asked for one.
pub struct FetchResults<S: JobStore + ?Sized> {
    applications: Arc<dyn ApplicationStore>,
    timeline: Arc<dyn TimelineStore>,
    queue: Arc<QueueManager<S>>,
}

impl<S: JobStore + ?Sized> FetchResults<S> {
    pub fn new(
        applications: Arc<dyn ApplicationStore>,
        timeline: Arc<dyn TimelineStore>,
        queue: Arc<QueueManager<S>>,
    ) -> Self {
        Self {
            applications,
            timeline,
            queue,
        }
    }
}

#[async_trait]
impl<S: JobStore + ?Sized> ResultProcessor for FetchResults<S> {
    async fn process_success(&self, job: &Job, outcome: &JobOutcome) -> Result<(), ResultError> {
        let JobOutcome::Fetch {
            posting_id,
            title,
            company,
            partial,
        } = outcome
        else {
            warn!(job_id = %job.id, class = %outcome.class(), "fetch results given a non-fetch outcome; ignoring");
            return Ok(());
        };

        let app_id = ApplicationId::from_uuid(job.parent_ref);
        let Some(mut app) = self.applications.load(app_id).await? else {
            info!(job_id = %job.id, application_id = %app_id, "fetch completed for vanished application; discarding");
            return Ok(());
        };
        if !app.is_live() {
            info!(job_id = %job.id, application_id = %app_id, "fetch completed for deleted application; discarding");
            return Ok(());
        }

        if app.link_posting(*posting_id) == LinkOutcome::AlreadyLinked {
            debug!(job_id = %job.id, application_id = %app_id, "posting already linked; duplicate callback ignored");
            return Ok(());
        }
        app.backfill_from_posting(company.as_deref(), title.as_deref());
        self.applications.update(&app).await?;

        self.timeline
            .append(TimelineEvent::new(
                job.parent_ref,
                TimelineEventType::PostingLinked,
                serde_json::json!({
                    "posting_id": posting_id,
                    "partial": partial,
                }),
            ))
            .await?;
        info!(job_id = %job.id, application_id = %app_id, posting_id = %posting_id, "posting linked");

        if app.auto_analyze && app.analysis_id.is_none() {
            let payload = JobPayload::Analyze {
                posting_id: Some(*posting_id),
                resume_id: app.resume_id,
            };
            let analyze_id = self
                .queue
                .enqueue(job.parent_ref, payload, job.priority)
                .await
                .map_err(|e| ResultError::Store(e.to_string()))?;
            info!(job_id = %job.id, follow_on = %analyze_id, "auto-analyze follow-on enqueued");
        }

        Ok(())
    }

    async fn process_failure(&self, job: &Job) -> Result<(), ResultError> {
        let app_id = ApplicationId::from_uuid(job.parent_ref);
        let live = self
            .applications
            .load(app_id)
            .await?
            .is_some_and(|a| a.is_live());
        if !live {
            debug!(job_id = %job.id, application_id = %app_id, "fetch failure for vanished application; discarding");
            return Ok(());
        }

        self.timeline
            .append(TimelineEvent::new(
                job.parent_ref,
                TimelineEventType::FetchFailed,
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
