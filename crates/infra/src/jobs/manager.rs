//! Queue manager: the only writer of job rows.
//!
//! Enqueues new jobs, claims the next eligible one for a worker, and applies
//! the retry policy when outcomes are reported. Reports are idempotent:
//! duplicates for a job that already reached a terminal state, and reports
//! for a job whose row was cascaded away, are acknowledged as no-ops so any
//! process can safely report on behalf of any dequeuer.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use jobtrail_core::JobId;

use super::retry::{self, RetryDecision};
use super::store::{JobStore, JobStoreError, QueueStatus};
use super::types::{ErrorKind, Job, JobClass, JobPayload};

/// Acknowledgement of a success report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportAck {
    Applied,
    /// The job already reached a terminal state; duplicate accepted as no-op.
    AlreadyTerminal,
    /// No such row (parent deleted mid-flight); accepted as no-op.
    UnknownJob,
}

/// Outcome of a failure report.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Returned to pending, eligible again at `retry_after`.
    Retried {
        job: Job,
        retry_after: DateTime<Utc>,
    },
    /// Terminal failure; the job carries its error fields.
    Failed { job: Job },
    AlreadyTerminal,
    UnknownJob,
}

pub struct QueueManager<S: JobStore + ?Sized> {
    store: Arc<S>,
}

impl<S: JobStore + ?Sized> QueueManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Direct store access for the watchdog's stale scan and for tests.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Insert a new pending job. No deduplication: callers decide whether a
    /// duplicate would be wasteful (e.g. check for a fresh prior result).
    pub async fn enqueue(
        &self,
        parent_ref: Uuid,
        payload: JobPayload,
        priority: i32,
    ) -> Result<JobId, JobStoreError> {
        let job = Job::new(parent_ref, payload, priority);
        let class = job.class();
        let id = self.store.insert(job).await?;
        info!(job_id = %id, class = %class, %parent_ref, priority, "job enqueued");
        Ok(id)
    }

    /// Claim the next eligible job of the class, or None.
    pub async fn dequeue(&self, class: JobClass) -> Result<Option<Job>, JobStoreError> {
        let claimed = self.store.claim_next(class, Utc::now()).await?;
        if let Some(job) = &claimed {
            debug!(job_id = %job.id, class = %class, attempts = job.attempts, "job claimed");
        }
        Ok(claimed)
    }

    pub async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        self.store.get(job_id).await
    }

    /// Mark a job complete. `result_ref` is not stored on the row; the
    /// result processor uses it to update the parent in the same logical
    /// operation.
    pub async fn report_success(
        &self,
        job_id: JobId,
        result_ref: Uuid,
    ) -> Result<ReportAck, JobStoreError> {
        let Some(mut job) = self.store.get(job_id).await? else {
            warn!(job_id = %job_id, "success reported for unknown job; ignoring");
            return Ok(ReportAck::UnknownJob);
        };

        if job.status.is_terminal() {
            debug!(job_id = %job_id, status = job.status.as_str(), "duplicate success report; ignoring");
            return Ok(ReportAck::AlreadyTerminal);
        }

        job.complete(Utc::now());
        self.store.update(&job).await?;
        info!(job_id = %job_id, class = %job.class(), %result_ref, "job completed");
        Ok(ReportAck::Applied)
    }

    /// Record a failed attempt and apply the retry policy: either back to
    /// pending with backoff, or terminally failed with the error stored.
    pub async fn report_failure(
        &self,
        job_id: JobId,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Result<FailureOutcome, JobStoreError> {
        let message = message.into();

        let Some(mut job) = self.store.get(job_id).await? else {
            warn!(job_id = %job_id, kind = %kind, "failure reported for unknown job; ignoring");
            return Ok(FailureOutcome::UnknownJob);
        };

        if job.status.is_terminal() {
            debug!(job_id = %job_id, status = job.status.as_str(), "duplicate failure report; ignoring");
            return Ok(FailureOutcome::AlreadyTerminal);
        }

        job.record_attempt();
        let class = job.class();

        match retry::decide(class, kind, job.attempts, job.max_attempts) {
            RetryDecision::Retry { delay } => {
                let retry_after =
                    Utc::now() + ChronoDuration::from_std(delay).unwrap_or_default();
                job.reschedule(kind, message.clone(), retry_after);
                self.store.update(&job).await?;
                info!(
                    job_id = %job_id,
                    class = %class,
                    kind = %kind,
                    attempt = job.attempts,
                    retry_after = %retry_after,
                    "job failed; retry scheduled"
                );
                Ok(FailureOutcome::Retried { job, retry_after })
            }
            RetryDecision::Fail => {
                job.fail(kind, message.clone(), Utc::now());
                self.store.update(&job).await?;
                warn!(
                    job_id = %job_id,
                    class = %class,
                    kind = %kind,
                    attempts = job.attempts,
                    error = %message,
                    "job failed terminally"
                );
                Ok(FailureOutcome::Failed { job })
            }
        }
    }

    /// Per-class counters for the monitoring endpoints.
    pub async fn queue_status(&self) -> Result<Vec<QueueStatus>, JobStoreError> {
        let now = Utc::now();
        let mut result = Vec::with_capacity(JobClass::ALL.len());
        for class in JobClass::ALL {
            result.push(self.store.status(class, now).await?);
        }
        Ok(result)
    }

    pub async fn jobs_for_parent(&self, parent_ref: Uuid) -> Result<Vec<Job>, JobStoreError> {
        self.store.list_for_parent(parent_ref).await
    }

    /// Cascade for parent deletion: remove the parent's non-terminal jobs.
    pub async fn purge_for_parent(&self, parent_ref: Uuid) -> Result<usize, JobStoreError> {
        let removed = self.store.purge_for_parent(parent_ref).await?;
        if removed > 0 {
            info!(%parent_ref, removed, "purged in-flight jobs for deleted parent");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::store::InMemoryJobStore;
    use crate::jobs::types::JobStatus;

    fn manager() -> QueueManager<InMemoryJobStore> {
        QueueManager::new(Arc::new(InMemoryJobStore::new()))
    }

    fn fetch_payload() -> JobPayload {
        JobPayload::Fetch {
            url: "https://example.com/job/1".to_string(),
        }
    }

    fn parse_payload() -> JobPayload {
        JobPayload::Parse {
            file_path: "/uploads/cv.pdf".to_string(),
        }
    }

    fn analyze_payload() -> JobPayload {
        JobPayload::Analyze {
            posting_id: None,
            resume_id: None,
        }
    }

    #[tokio::test]
    async fn success_report_is_idempotent() {
        let mgr = manager();
        let id = mgr.enqueue(Uuid::now_v7(), fetch_payload(), 0).await.unwrap();
        mgr.dequeue(JobClass::Fetch).await.unwrap().unwrap();

        let result_ref = Uuid::now_v7();
        assert_eq!(
            mgr.report_success(id, result_ref).await.unwrap(),
            ReportAck::Applied
        );
        assert_eq!(
            mgr.report_success(id, result_ref).await.unwrap(),
            ReportAck::AlreadyTerminal
        );

        let job = mgr.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Complete);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn reports_for_unknown_job_are_noops() {
        let mgr = manager();
        let ghost = JobId::new();

        assert_eq!(
            mgr.report_success(ghost, Uuid::now_v7()).await.unwrap(),
            ReportAck::UnknownJob
        );
        assert_eq!(
            mgr.report_failure(ghost, ErrorKind::Timeout, "gone").await.unwrap(),
            FailureOutcome::UnknownJob
        );
    }

    #[tokio::test]
    async fn parse_failure_is_terminal_on_first_attempt() {
        // Scenario: a parse job fails with a corrupted file; parse never retries.
        let mgr = manager();
        let id = mgr.enqueue(Uuid::now_v7(), parse_payload(), 0).await.unwrap();
        mgr.dequeue(JobClass::Parse).await.unwrap().unwrap();

        let outcome = mgr
            .report_failure(id, ErrorKind::CorruptedFile, "unreadable pdf")
            .await
            .unwrap();
        let FailureOutcome::Failed { job } = outcome else {
            panic!("expected terminal failure, got {outcome:?}");
        };

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert!(job.retry_after.is_none());
        assert_eq!(job.error_kind, Some(ErrorKind::CorruptedFile));
    }

    #[tokio::test]
    async fn analyze_rate_limited_backs_off_then_exhausts() {
        // Scenario: rate-limited analysis retries on the 5/15/30 ladder and
        // the third failure is terminal.
        let mgr = manager();
        let id = mgr.enqueue(Uuid::now_v7(), analyze_payload(), 0).await.unwrap();

        mgr.dequeue(JobClass::Analyze).await.unwrap().unwrap();
        let before = Utc::now();
        let outcome = mgr
            .report_failure(id, ErrorKind::RateLimited, "429")
            .await
            .unwrap();
        let FailureOutcome::Retried { job, retry_after } = outcome else {
            panic!("expected retry, got {outcome:?}");
        };
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);

        let delay = retry_after - before;
        assert!(delay >= ChronoDuration::minutes(4) && delay <= ChronoDuration::minutes(6));

        // Second failure: clear the backoff so the job can be claimed again.
        let mut eligible = mgr.get(id).await.unwrap().unwrap();
        eligible.retry_after = Some(Utc::now() - ChronoDuration::seconds(1));
        mgr.store().update(&eligible).await.unwrap();
        mgr.dequeue(JobClass::Analyze).await.unwrap().unwrap();
        assert!(matches!(
            mgr.report_failure(id, ErrorKind::RateLimited, "429").await.unwrap(),
            FailureOutcome::Retried { .. }
        ));

        // Third failure exhausts the budget.
        let mut eligible = mgr.get(id).await.unwrap().unwrap();
        eligible.retry_after = Some(Utc::now() - ChronoDuration::seconds(1));
        mgr.store().update(&eligible).await.unwrap();
        mgr.dequeue(JobClass::Analyze).await.unwrap().unwrap();
        let outcome = mgr
            .report_failure(id, ErrorKind::RateLimited, "429")
            .await
            .unwrap();
        let FailureOutcome::Failed { job } = outcome else {
            panic!("expected terminal failure, got {outcome:?}");
        };
        assert_eq!(job.attempts, 3);

        // Further reports are acknowledged no-ops.
        assert_eq!(
            mgr.report_failure(id, ErrorKind::RateLimited, "429").await.unwrap(),
            FailureOutcome::AlreadyTerminal
        );
    }

    #[tokio::test]
    async fn attempts_never_exceed_budget_under_duplicate_reports() {
        let mgr = manager();
        let id = mgr.enqueue(Uuid::now_v7(), parse_payload(), 0).await.unwrap();
        mgr.dequeue(JobClass::Parse).await.unwrap().unwrap();

        for _ in 0..5 {
            mgr.report_failure(id, ErrorKind::Unknown, "boom").await.unwrap();
        }

        let job = mgr.get(id).await.unwrap().unwrap();
        assert!(job.attempts <= job.max_attempts);
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn purge_removes_pending_jobs_for_parent() {
        let mgr = manager();
        let parent = Uuid::now_v7();
        let id = mgr.enqueue(parent, fetch_payload(), 0).await.unwrap();

        assert_eq!(mgr.purge_for_parent(parent).await.unwrap(), 1);
        assert!(mgr.get(id).await.unwrap().is_none());

        // Late callback from a worker that was processing it: no-op.
        assert_eq!(
            mgr.report_failure(id, ErrorKind::Timeout, "late").await.unwrap(),
            FailureOutcome::UnknownJob
        );
    }

    #[tokio::test]
    async fn queue_status_covers_all_classes() {
        let mgr = manager();
        mgr.enqueue(Uuid::now_v7(), fetch_payload(), 0).await.unwrap();

        let status = mgr.queue_status().await.unwrap();
        assert_eq!(status.len(), 3);
        let fetch = status.iter().find(|s| s.class == JobClass::Fetch).unwrap();
        assert_eq!(fetch.pending, 1);
    }
}
