//! Crate-level scenarios exercising the queue engine, result processors,
//! and watchdog together over the in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use jobtrail_core::PostingId;
use jobtrail_tracker::{Application, ApplicationSource, TimelineEventType};

use crate::jobs::{
    store::JobStore,
    ErrorKind, InMemoryJobStore, Job, JobClass, JobOutcome, JobPayload, JobStatus, Processor,
    ProcessorError, QueueManager, ReportAck, ResultProcessor, Watchdog, WatchdogConfig,
    WorkerConfig, WorkerLoop,
};
use crate::pipelines::FetchResults;
use crate::stores::{
    ApplicationStore, InMemoryApplicationStore, InMemoryTimelineStore, TimelineStore,
};

struct World {
    applications: Arc<InMemoryApplicationStore>,
    timeline: Arc<InMemoryTimelineStore>,
    queue: Arc<QueueManager<InMemoryJobStore>>,
    fetch_results: Arc<FetchResults<InMemoryJobStore>>,
}

fn world() -> World {
    let applications = Arc::new(InMemoryApplicationStore::new());
    let timeline = Arc::new(InMemoryTimelineStore::new());
    let queue = Arc::new(QueueManager::new(Arc::new(InMemoryJobStore::new())));
    let fetch_results = Arc::new(FetchResults::new(
        applications.clone() as Arc<dyn ApplicationStore>,
        timeline.clone() as Arc<dyn TimelineStore>,
        queue.clone(),
    ));
    World {
        applications,
        timeline,
        queue,
        fetch_results,
    }
}

fn capture_app(url: &str) -> Application {
    Application::new(
        "",
        "",
        Some(url.to_string()),
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        ApplicationSource::BrowserCapture,
    )
}

fn fetch_payload(url: &str) -> JobPayload {
    JobPayload::Fetch {
        url: url.to_string(),
    }
}

/// A higher-priority job enqueued later is claimed before an older
/// lower-priority one.
#[tokio::test]
async fn priority_beats_age_on_dequeue() {
    let w = world();
    let old = w
        .queue
        .enqueue(Uuid::now_v7(), fetch_payload("https://example.com/a"), 10)
        .await
        .unwrap();
    let urgent = w
        .queue
        .enqueue(Uuid::now_v7(), fetch_payload("https://example.com/b"), 50)
        .await
        .unwrap();

    let first = w.queue.dequeue(JobClass::Fetch).await.unwrap().unwrap();
    assert_eq!(first.id, urgent);
    let second = w.queue.dequeue(JobClass::Fetch).await.unwrap().unwrap();
    assert_eq!(second.id, old);
    assert!(w.queue.dequeue(JobClass::Fetch).await.unwrap().is_none());
}

/// Parent deleted between dequeue and the success callback: the purge removes
/// the row, the late callback is acknowledged as a no-op, and nothing on the
/// dead parent is mutated.
#[tokio::test]
async fn deletion_mid_flight_discards_the_late_callback() {
    let w = world();
    let app = capture_app("https://example.com/job/1");
    let app_id = app.id;
    w.applications.insert(app).await.unwrap();

    let job_id = w
        .queue
        .enqueue(
            *app_id.as_uuid(),
            fetch_payload("https://example.com/job/1"),
            0,
        )
        .await
        .unwrap();
    let claimed = w.queue.dequeue(JobClass::Fetch).await.unwrap().unwrap();

    // User deletes the application while the worker is fetching.
    let mut app = w.applications.load(app_id).await.unwrap().unwrap();
    app.soft_delete();
    w.applications.update(&app).await.unwrap();
    w.queue.purge_for_parent(*app_id.as_uuid()).await.unwrap();

    // The worker comes back with a result.
    let outcome = JobOutcome::Fetch {
        posting_id: PostingId::new(),
        title: Some("Engineer".to_string()),
        company: Some("Acme".to_string()),
        partial: false,
    };
    assert_eq!(
        w.queue
            .report_success(job_id, outcome.result_ref())
            .await
            .unwrap(),
        ReportAck::UnknownJob
    );
    w.fetch_results
        .process_success(&claimed, &outcome)
        .await
        .unwrap();

    let app = w.applications.load(app_id).await.unwrap().unwrap();
    assert_eq!(app.posting_id, None);
    assert_eq!(app.company_name, jobtrail_tracker::UNKNOWN_COMPANY);
    assert!(w.timeline.list(*app_id.as_uuid()).await.unwrap().is_empty());
}

struct OneShotFetch {
    posting_id: PostingId,
}

#[async_trait::async_trait]
impl Processor for OneShotFetch {
    fn class(&self) -> JobClass {
        JobClass::Fetch
    }

    async fn run(&self, _job: &Job) -> Result<JobOutcome, ProcessorError> {
        Ok(JobOutcome::Fetch {
            posting_id: self.posting_id,
            title: Some("Engineer".to_string()),
            company: Some("Acme".to_string()),
            partial: false,
        })
    }
}

/// End to end: a capture with auto-analyze gets its posting linked, its
/// placeholders backfilled, and exactly one analysis job enqueued.
#[tokio::test(flavor = "multi_thread")]
async fn auto_analyze_enqueues_exactly_one_follow_on() {
    let w = world();
    let app = capture_app("https://example.com/job/1").with_auto_analyze(true);
    let app_id = app.id;
    w.applications.insert(app).await.unwrap();

    w.queue
        .enqueue(
            *app_id.as_uuid(),
            fetch_payload("https://example.com/job/1"),
            0,
        )
        .await
        .unwrap();

    let handle = WorkerLoop::spawn(
        w.queue.clone(),
        Arc::new(OneShotFetch {
            posting_id: PostingId::new(),
        }),
        w.fetch_results.clone() as Arc<dyn ResultProcessor>,
        WorkerConfig::default()
            .with_name("fetch-e2e")
            .with_poll_interval(Duration::from_millis(10)),
    );

    let parent = *app_id.as_uuid();
    let mut seen = false;
    for _ in 0..200 {
        let jobs = w.queue.jobs_for_parent(parent).await.unwrap();
        if jobs.iter().any(|j| j.class() == JobClass::Analyze) {
            seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(seen, "follow-on analysis never appeared");
    handle.shutdown().await;

    let jobs = w.queue.jobs_for_parent(parent).await.unwrap();
    let analyze_count = jobs
        .iter()
        .filter(|j| j.class() == JobClass::Analyze)
        .count();
    assert_eq!(analyze_count, 1);

    let app = w.applications.load(app_id).await.unwrap().unwrap();
    assert!(app.posting_id.is_some());
    assert!(!app.needs_review);
    assert_eq!(app.company_name, "Acme");

    let events = w.timeline.list(parent).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, TimelineEventType::PostingLinked);
}

/// Many tasks racing to claim a single pending job: exactly one wins.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_dequeue_claims_each_job_once() {
    let w = world();
    w.queue
        .enqueue(Uuid::now_v7(), fetch_payload("https://example.com"), 0)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let queue = w.queue.clone();
        handles.push(tokio::spawn(async move {
            queue.dequeue(JobClass::Fetch).await.unwrap()
        }));
    }

    let mut claimed = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            claimed += 1;
        }
    }
    assert_eq!(claimed, 1);
}

/// A worker that claimed a fetch and died: the watchdog requeues the job on
/// the shared attempt budget and a healthy worker finishes it.
#[tokio::test(flavor = "multi_thread")]
async fn watchdog_recovery_feeds_a_healthy_worker() {
    let w = world();
    let app = capture_app("https://example.com/job/1");
    let app_id = app.id;
    w.applications.insert(app).await.unwrap();

    let job_id = w
        .queue
        .enqueue(
            *app_id.as_uuid(),
            fetch_payload("https://example.com/job/1"),
            0,
        )
        .await
        .unwrap();

    // Simulate a crashed worker: claim, then never report.
    let mut abandoned = w.queue.dequeue(JobClass::Fetch).await.unwrap().unwrap();
    abandoned.started_at = Some(Utc::now() - chrono::Duration::hours(1));
    w.queue.store().update(&abandoned).await.unwrap();

    let config = WatchdogConfig::default();
    assert_eq!(Watchdog::sweep(&w.queue, &config).await, 1);

    let mut requeued = w.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(requeued.status, JobStatus::Pending);
    assert_eq!(requeued.attempts, 1);
    assert_eq!(requeued.error_kind, Some(ErrorKind::WorkerAbandoned));

    // Clear the backoff so the healthy claim happens immediately.
    requeued.retry_after = Some(Utc::now() - chrono::Duration::seconds(1));
    w.queue.store().update(&requeued).await.unwrap();

    let recovered = w.queue.dequeue(JobClass::Fetch).await.unwrap().unwrap();
    assert_eq!(recovered.id, job_id);
    let outcome = JobOutcome::Fetch {
        posting_id: PostingId::new(),
        title: None,
        company: None,
        partial: true,
    };
    assert_eq!(
        w.queue
            .report_success(job_id, outcome.result_ref())
            .await
            .unwrap(),
        ReportAck::Applied
    );
    w.fetch_results
        .process_success(&recovered, &outcome)
        .await
        .unwrap();

    let done = w.queue.get(job_id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Complete);
    // Partial extraction: posting linked but the review flag stays.
    let app = w.applications.load(app_id).await.unwrap().unwrap();
    assert!(app.posting_id.is_some());
    assert!(app.needs_review);
}
