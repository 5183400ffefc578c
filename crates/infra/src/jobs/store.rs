//! Job storage implementations.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use jobtrail_core::JobId;

use super::types::{Job, JobClass, JobStatus};

/// Job store abstraction.
///
/// `claim_next` is the dequeue lock: implementations must guarantee that no
/// two concurrent callers receive the same row, and must skip (not block on)
/// rows another caller is claiming.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job row.
    async fn insert(&self, job: Job) -> Result<JobId, JobStoreError>;

    /// Load a job by id.
    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Persist an updated job row.
    async fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Atomically claim the next eligible job of the class: highest priority,
    /// ties broken by earliest `created_at`, restricted to pending rows whose
    /// `retry_after` has passed. The claimed row is transitioned to
    /// processing with `started_at = now` before it is returned.
    async fn claim_next(
        &self,
        class: JobClass,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>, JobStoreError>;

    /// All jobs stuck in processing since before `cutoff` (any class).
    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, JobStoreError>;

    /// Jobs belonging to a parent, newest first.
    async fn list_for_parent(&self, parent_ref: Uuid) -> Result<Vec<Job>, JobStoreError>;

    /// Delete the parent's non-terminal jobs (cascade on parent deletion).
    /// Terminal rows are kept as history. Returns the number removed.
    async fn purge_for_parent(&self, parent_ref: Uuid) -> Result<usize, JobStoreError>;

    /// Per-class queue counters for monitoring.
    async fn status(
        &self,
        class: JobClass,
        now: DateTime<Utc>,
    ) -> Result<QueueStatus, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Read-only queue counters per class.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStatus {
    pub class: JobClass,
    pub pending: usize,
    pub processing: usize,
    pub complete: usize,
    pub failed: usize,
    /// Age of the oldest pending job, seconds. None when the queue is empty.
    pub oldest_pending_secs: Option<i64>,
}

/// In-memory job store for tests/dev and single-process deployments.
///
/// A single write lock around the map makes each claim atomic; the lock is
/// never held across an await point.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.jobs.read().unwrap();
        Ok(jobs.get(&job_id).cloned())
    }

    async fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(JobStoreError::NotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn claim_next(
        &self,
        class: JobClass,
        now: DateTime<Utc>,
    ) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();

        let next = jobs
            .values()
            .filter(|j| j.class() == class && j.is_eligible(now))
            .min_by_key(|j| (Reverse(j.priority), j.created_at))
            .map(|j| j.id);

        match next {
            Some(id) => {
                let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
                job.begin(now);
                Ok(Some(job.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut stale: Vec<_> = jobs
            .values()
            .filter(|j| {
                j.status == JobStatus::Processing && j.started_at.is_some_and(|t| t < cutoff)
            })
            .cloned()
            .collect();
        stale.sort_by_key(|j| j.started_at);
        Ok(stale)
    }

    async fn list_for_parent(&self, parent_ref: Uuid) -> Result<Vec<Job>, JobStoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut result: Vec<_> = jobs
            .values()
            .filter(|j| j.parent_ref == parent_ref)
            .cloned()
            .collect();
        result.sort_by_key(|j| Reverse(j.created_at));
        Ok(result)
    }

    async fn purge_for_parent(&self, parent_ref: Uuid) -> Result<usize, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let before = jobs.len();
        jobs.retain(|_, j| j.parent_ref != parent_ref || j.status.is_terminal());
        Ok(before - jobs.len())
    }

    async fn status(
        &self,
        class: JobClass,
        now: DateTime<Utc>,
    ) -> Result<QueueStatus, JobStoreError> {
        let jobs = self.jobs.read().unwrap();

        let mut status = QueueStatus {
            class,
            pending: 0,
            processing: 0,
            complete: 0,
            failed: 0,
            oldest_pending_secs: None,
        };

        let mut oldest_pending: Option<DateTime<Utc>> = None;
        for job in jobs.values().filter(|j| j.class() == class) {
            match job.status {
                JobStatus::Pending => {
                    status.pending += 1;
                    if oldest_pending.is_none_or(|t| job.created_at < t) {
                        oldest_pending = Some(job.created_at);
                    }
                }
                JobStatus::Processing => status.processing += 1,
                JobStatus::Complete => status.complete += 1,
                JobStatus::Failed => status.failed += 1,
            }
        }

        status.oldest_pending_secs = oldest_pending.map(|t| (now - t).num_seconds().max(0));
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::{ErrorKind, JobPayload};

    fn fetch_job(priority: i32) -> Job {
        Job::new(
            Uuid::now_v7(),
            JobPayload::Fetch {
                url: "https://example.com/job".to_string(),
            },
            priority,
        )
    }

    #[tokio::test]
    async fn claim_prefers_priority_then_age() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();

        let mut old_low = fetch_job(10);
        old_low.created_at = now - chrono::Duration::hours(1);
        let high = fetch_job(50);

        store.insert(old_low.clone()).await.unwrap();
        store.insert(high.clone()).await.unwrap();

        let first = store.claim_next(JobClass::Fetch, now).await.unwrap().unwrap();
        assert_eq!(first.id, high.id);
        assert_eq!(first.status, JobStatus::Processing);
        assert_eq!(first.started_at, Some(now));

        let second = store.claim_next(JobClass::Fetch, now).await.unwrap().unwrap();
        assert_eq!(second.id, old_low.id);

        assert!(store.claim_next(JobClass::Fetch, now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_ties_broken_by_earliest_created() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();

        let mut older = fetch_job(5);
        older.created_at = now - chrono::Duration::minutes(30);
        let newer = fetch_job(5);

        store.insert(newer.clone()).await.unwrap();
        store.insert(older.clone()).await.unwrap();

        let first = store.claim_next(JobClass::Fetch, now).await.unwrap().unwrap();
        assert_eq!(first.id, older.id);
    }

    #[tokio::test]
    async fn claim_skips_backoff_and_other_classes() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();

        let mut delayed = fetch_job(0);
        delayed.reschedule(
            ErrorKind::Timeout,
            "timeout".to_string(),
            now + chrono::Duration::minutes(5),
        );
        store.insert(delayed.clone()).await.unwrap();

        let parse = Job::new(
            Uuid::now_v7(),
            JobPayload::Parse {
                file_path: "/uploads/cv.pdf".to_string(),
            },
            0,
        );
        store.insert(parse).await.unwrap();

        assert!(store.claim_next(JobClass::Fetch, now).await.unwrap().is_none());

        let later = now + chrono::Duration::minutes(6);
        let claimed = store.claim_next(JobClass::Fetch, later).await.unwrap().unwrap();
        assert_eq!(claimed.id, delayed.id);
    }

    #[tokio::test]
    async fn purge_keeps_terminal_history() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        let parent = Uuid::now_v7();

        let mut done = fetch_job(0);
        done.parent_ref = parent;
        done.complete(now);
        let pending = {
            let mut j = fetch_job(0);
            j.parent_ref = parent;
            j
        };

        store.insert(done.clone()).await.unwrap();
        store.insert(pending.clone()).await.unwrap();

        let removed = store.purge_for_parent(parent).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(pending.id).await.unwrap().is_none());
        assert!(store.get(done.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_listing_only_sees_old_processing_rows() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();

        let mut stuck = fetch_job(0);
        stuck.begin(now - chrono::Duration::minutes(30));
        let mut fresh = fetch_job(0);
        fresh.begin(now - chrono::Duration::seconds(10));
        let pending = fetch_job(0);

        store.insert(stuck.clone()).await.unwrap();
        store.insert(fresh).await.unwrap();
        store.insert(pending).await.unwrap();

        let cutoff = now - chrono::Duration::minutes(10);
        let stale = store.list_stale(cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, stuck.id);
    }

    #[tokio::test]
    async fn status_counts_and_oldest_pending_age() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();

        let mut old = fetch_job(0);
        old.created_at = now - chrono::Duration::seconds(90);
        store.insert(old).await.unwrap();
        store.insert(fetch_job(0)).await.unwrap();

        let status = store.status(JobClass::Fetch, now).await.unwrap();
        assert_eq!(status.pending, 2);
        assert_eq!(status.oldest_pending_secs, Some(90));

        let empty = store.status(JobClass::Analyze, now).await.unwrap();
        assert_eq!(empty.pending, 0);
        assert!(empty.oldest_pending_secs.is_none());
    }
}
