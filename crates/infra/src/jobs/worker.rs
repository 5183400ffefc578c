//! Per-class polling worker loop.
//!
//! Iteration state machine: idle → dequeued → invoking → reporting → idle.
//! The loop owns no job state across iterations; everything observable goes
//! through the queue manager, so a crashed worker leaves at most one row in
//! `processing` for the watchdog to recover.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::manager::{FailureOutcome, QueueManager, ReportAck};
use super::processor::{Processor, ResultProcessor};
use super::store::JobStore;
use super::types::Job;

/// Worker loop configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name for logging.
    pub name: String,
    /// Sleep between polls when the queue is empty.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "worker".to_string(),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Worker runtime counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WorkerStats {
    pub processed: u64,
    pub succeeded: u64,
    pub retried: u64,
    pub failed: u64,
}

/// Shutdown signal shared between a handle and its loop. The flag is the
/// authoritative bit; the notify only wakes an idle sleep early.
#[derive(Default)]
struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Handle to control a running worker.
pub struct WorkerHandle {
    shutdown: Arc<Shutdown>,
    join: JoinHandle<()>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the loop to finish its current
    /// job. An abandoned job (process killed) is recovered by the watchdog.
    pub async fn shutdown(self) {
        self.shutdown.request();
        let _ = self.join.await;
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().unwrap().clone()
    }
}

/// Spawns per-class worker loops.
pub struct WorkerLoop;

impl WorkerLoop {
    pub fn spawn<S: JobStore + ?Sized + 'static>(
        manager: Arc<QueueManager<S>>,
        processor: Arc<dyn Processor>,
        results: Arc<dyn ResultProcessor>,
        config: WorkerConfig,
    ) -> WorkerHandle {
        let shutdown = Arc::new(Shutdown::default());
        let stats = Arc::new(Mutex::new(WorkerStats::default()));

        let join = tokio::spawn(worker_loop(
            manager,
            processor,
            results,
            config,
            shutdown.clone(),
            stats.clone(),
        ));

        WorkerHandle {
            shutdown,
            join,
            stats,
        }
    }
}

async fn worker_loop<S: JobStore + ?Sized>(
    manager: Arc<QueueManager<S>>,
    processor: Arc<dyn Processor>,
    results: Arc<dyn ResultProcessor>,
    config: WorkerConfig,
    shutdown: Arc<Shutdown>,
    stats: Arc<Mutex<WorkerStats>>,
) {
    let class = processor.class();
    info!(worker = %config.name, class = %class, "worker started");

    loop {
        // Observe a shutdown request between jobs without consuming a poll
        // delay.
        if shutdown.is_requested() {
            break;
        }

        match manager.dequeue(class).await {
            Ok(Some(job)) => {
                stats.lock().unwrap().processed += 1;
                run_one(&manager, processor.as_ref(), results.as_ref(), &config, &stats, job)
                    .await;
            }
            Ok(None) => {
                tokio::select! {
                    _ = shutdown.notify.notified() => break,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            Err(e) => {
                error!(worker = %config.name, error = %e, "dequeue failed");
                tokio::select! {
                    _ = shutdown.notify.notified() => break,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
        }
    }

    info!(worker = %config.name, class = %class, "worker stopped");
}

async fn run_one<S: JobStore + ?Sized>(
    manager: &QueueManager<S>,
    processor: &dyn Processor,
    results: &dyn ResultProcessor,
    config: &WorkerConfig,
    stats: &Mutex<WorkerStats>,
    job: Job,
) {
    match processor.run(&job).await {
        Ok(outcome) => match manager.report_success(job.id, outcome.result_ref()).await {
            Ok(ReportAck::Applied) => {
                stats.lock().unwrap().succeeded += 1;
                // A store failure here must not revert the job: the outcome
                // is recoverable from job history on the next user action.
                if let Err(e) = results.process_success(&job, &outcome).await {
                    warn!(
                        worker = %config.name,
                        job_id = %job.id,
                        error = %e,
                        "result processing failed; job remains complete"
                    );
                }
            }
            Ok(_) => {
                // Terminal duplicate or cascaded row: another reporter won.
            }
            Err(e) => {
                error!(worker = %config.name, job_id = %job.id, error = %e, "failed to report success");
            }
        },
        Err(failure) => {
            match manager
                .report_failure(job.id, failure.kind, failure.message.clone())
                .await
            {
                Ok(FailureOutcome::Failed { job: failed }) => {
                    stats.lock().unwrap().failed += 1;
                    if let Err(e) = results.process_failure(&failed).await {
                        warn!(
                            worker = %config.name,
                            job_id = %failed.id,
                            error = %e,
                            "failure recording failed; job remains failed"
                        );
                    }
                }
                Ok(FailureOutcome::Retried { .. }) => {
                    stats.lock().unwrap().retried += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(worker = %config.name, job_id = %job.id, error = %e, "failed to report failure");
                }
            }
        }
    }
}
