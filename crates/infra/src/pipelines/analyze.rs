//! Result processor for match-analysis jobs.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use jobtrail_core::ApplicationId;
use jobtrail_tracker::{LinkOutcome, TimelineEvent, TimelineEventType};

use crate::jobs::{Job, JobOutcome, ResultError, ResultProcessor};
use crate::stores::{ApplicationStore, TimelineStore};

/// Applies analysis outcomes to the owning application.
pub struct AnalyzeResults {
    applications: Arc<dyn ApplicationStore>,
    timeline: Arc<dyn TimelineStore>,
}

impl AnalyzeResults {
    pub fn new(applications: Arc<dyn ApplicationStore>, timeline: Arc<dyn TimelineStore>) -> Self {
        Self {
            applications,
            timeline,
        }
    }
}

#[async_trait]
impl ResultProcessor for AnalyzeResults {
    async fn process_success(&self, job: &Job, outcome: &JobOutcome) -> Result<(), ResultError> {
        let JobOutcome::Analyze {
            analysis_id,
            match_score,
        } = outcome
        else {
            warn!(job_id = %job.id, class = %outcome.class(), "analyze results given a non-analyze outcome; ignoring");
            return Ok(());
        };

        let app_id = ApplicationId::from_uuid(job.parent_ref);
        let Some(mut app) = self.applications.load(app_id).await? else {
            info!(job_id = %job.id, application_id = %app_id, "analysis completed for vanished application; discarding");
            return Ok(());
        };
        if !app.is_live() {
            info!(job_id = %job.id, application_id = %app_id, "analysis completed for deleted application; discarding");
            return Ok(());
        }

        if app.link_analysis(*analysis_id) == LinkOutcome::AlreadyLinked {
            debug!(job_id = %job.id, application_id = %app_id, "analysis already linked; duplicate callback ignored");
            return Ok(());
        }
        self.applications.update(&app).await?;

        self.timeline
            .append(TimelineEvent::new(
                job.parent_ref,
                TimelineEventType::AnalysisCompleted,
                serde_json::json!({
                    "analysis_id": analysis_id,
                    "match_score": match_score,
                }),
            ))
            .await?;
        info!(job_id = %job.id, application_id = %app_id, analysis_id = %analysis_id, "analysis linked");
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
            debug!(job_id = %job.id, application_id = %app_id, "analysis failure for vanished application; discarding");
            return Ok(());
        }

        self.timeline
            .append(TimelineEvent::new(
                job.parent_ref,
                TimelineEventType::AnalysisFailed,
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
