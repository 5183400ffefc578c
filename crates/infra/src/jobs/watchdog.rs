//! Watchdog: recovers jobs abandoned mid-processing.
//!
//! A worker that dies between claiming a job and reporting its outcome
//! leaves the row in `processing` forever. The watchdog periodically scans
//! for rows whose `started_at` aged past the staleness threshold and
//! force-fails them as `worker-abandoned`; the retry policy then either
//! re-queues the job or fails it terminally against the shared attempt
//! budget.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::manager::{FailureOutcome, QueueManager};
use super::store::JobStore;
use super::types::ErrorKind;

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Time between scans.
    pub scan_interval: Duration,
    /// A `processing` job older than this is considered abandoned. Must
    /// comfortably exceed the slowest legitimate processor invocation.
    pub staleness_threshold: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(120),
            staleness_threshold: Duration::from_secs(600),
        }
    }
}

/// Handle to control a running watchdog.
pub struct WatchdogHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl WatchdogHandle {
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.join.await;
    }
}

pub struct Watchdog;

impl Watchdog {
    pub fn spawn<S: JobStore + ?Sized + 'static>(
        manager: Arc<QueueManager<S>>,
        config: WatchdogConfig,
    ) -> WatchdogHandle {
        let shutdown = Arc::new(Notify::new());

        let join = tokio::spawn(watchdog_loop(manager, config, shutdown.clone()));

        WatchdogHandle { shutdown, join }
    }

    /// One scan pass. Exposed for the loop and for deterministic tests.
    pub async fn sweep<S: JobStore + ?Sized>(
        manager: &QueueManager<S>,
        config: &WatchdogConfig,
    ) -> usize {
        let threshold = chrono::Duration::from_std(config.staleness_threshold).unwrap_or_default();
        let cutoff = Utc::now() - threshold;

        let stale = match manager.store().list_stale(cutoff).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "watchdog scan failed");
                return 0;
            }
        };

        let mut recovered = 0;
        for job in stale {
            let message = format!(
                "worker abandoned job; processing since {}",
                job.started_at.map(|t| t.to_rfc3339()).unwrap_or_default()
            );
            warn!(job_id = %job.id, class = %job.class(), "recovering abandoned job");

            match manager
                .report_failure(job.id, ErrorKind::WorkerAbandoned, message)
                .await
            {
                Ok(FailureOutcome::Retried { .. }) | Ok(FailureOutcome::Failed { .. }) => {
                    recovered += 1;
                }
                Ok(_) => {
                    // Raced with a late worker callback; the row already
                    // settled, nothing to recover.
                }
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "failed to recover abandoned job");
                }
            }
        }
        recovered
    }
}

async fn watchdog_loop<S: JobStore + ?Sized>(
    manager: Arc<QueueManager<S>>,
    config: WatchdogConfig,
    shutdown: Arc<Notify>,
) {
    info!(
        scan_interval_secs = config.scan_interval.as_secs(),
        staleness_secs = config.staleness_threshold.as_secs(),
        "watchdog started"
    );

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = tokio::time::sleep(config.scan_interval) => {}
        }

        let recovered = Watchdog::sweep(&manager, &config).await;
        if recovered > 0 {
            info!(recovered, "watchdog recovered abandoned jobs");
        }
    }

    info!("watchdog stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::jobs::store::InMemoryJobStore;
    use crate::jobs::types::{JobClass, JobPayload, JobStatus};

    fn config() -> WatchdogConfig {
        WatchdogConfig {
            scan_interval: Duration::from_secs(120),
            staleness_threshold: Duration::from_secs(600),
        }
    }

    async fn claimed_fetch_job(
        manager: &QueueManager<InMemoryJobStore>,
    ) -> crate::jobs::types::Job {
        manager
            .enqueue(
                Uuid::now_v7(),
                JobPayload::Fetch {
                    url: "https://example.com".to_string(),
                },
                0,
            )
            .await
            .unwrap();
        manager.dequeue(JobClass::Fetch).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn sweep_requeues_stale_processing_jobs() {
        let manager = QueueManager::new(Arc::new(InMemoryJobStore::new()));
        let mut job = claimed_fetch_job(&manager).await;

        // Backdate the claim beyond the staleness threshold.
        job.started_at = Some(Utc::now() - chrono::Duration::hours(1));
        manager.store().update(&job).await.unwrap();

        assert_eq!(Watchdog::sweep(&manager, &config()).await, 1);

        let recovered = manager.get(job.id).await.unwrap().unwrap();
        assert_eq!(recovered.status, JobStatus::Pending);
        assert_eq!(recovered.attempts, 1);
        assert_eq!(recovered.error_kind, Some(ErrorKind::WorkerAbandoned));
        assert!(recovered.retry_after.is_some());
    }

    #[tokio::test]
    async fn sweep_ignores_fresh_and_non_processing_jobs() {
        let manager = QueueManager::new(Arc::new(InMemoryJobStore::new()));

        // Fresh claim: within the staleness window.
        let fresh = claimed_fetch_job(&manager).await;

        // Pending job: never touched by the watchdog.
        manager
            .enqueue(
                Uuid::now_v7(),
                JobPayload::Fetch {
                    url: "https://example.com/2".to_string(),
                },
                0,
            )
            .await
            .unwrap();

        assert_eq!(Watchdog::sweep(&manager, &config()).await, 0);
        let untouched = manager.get(fresh.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, JobStatus::Processing);
        assert_eq!(untouched.attempts, 0);
    }

    #[tokio::test]
    async fn abandoned_parse_job_fails_terminally() {
        let manager = QueueManager::new(Arc::new(InMemoryJobStore::new()));
        manager
            .enqueue(
                Uuid::now_v7(),
                JobPayload::Parse {
                    file_path: "/uploads/cv.pdf".to_string(),
                },
                0,
            )
            .await
            .unwrap();
        let mut job = manager.dequeue(JobClass::Parse).await.unwrap().unwrap();

        job.started_at = Some(Utc::now() - chrono::Duration::hours(1));
        manager.store().update(&job).await.unwrap();

        assert_eq!(Watchdog::sweep(&manager, &config()).await, 1);

        let failed = manager.get(job.id).await.unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_kind, Some(ErrorKind::WorkerAbandoned));
    }
}
