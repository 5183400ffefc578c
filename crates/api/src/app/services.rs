//! Service wiring: stores, queue manager, result processors.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use jobtrail_infra::jobs::{
    InMemoryJobStore, JobClass, JobStore, PgJobStore, QueueManager, ResultProcessor,
};
use jobtrail_infra::pipelines::{AnalyzeResults, FetchResults, ParseResults};
use jobtrail_infra::stores::{
    ApplicationStore, InMemoryApplicationStore, InMemoryResumeStore, InMemoryTimelineStore,
    ResumeStore, TimelineStore,
};

/// Shared application services, injected into handlers as an `Extension`.
pub struct AppServices {
    pub applications: Arc<dyn ApplicationStore>,
    pub resumes: Arc<dyn ResumeStore>,
    pub timeline: Arc<dyn TimelineStore>,
    pub queue: Arc<QueueManager<dyn JobStore>>,
    fetch_results: Arc<dyn ResultProcessor>,
    parse_results: Arc<dyn ResultProcessor>,
    analyze_results: Arc<dyn ResultProcessor>,
}

impl AppServices {
    /// The result processor handling callbacks for a class.
    pub fn results_for(&self, class: JobClass) -> &Arc<dyn ResultProcessor> {
        match class {
            JobClass::Fetch => &self.fetch_results,
            JobClass::Parse => &self.parse_results,
            JobClass::Analyze => &self.analyze_results,
        }
    }
}

/// Wire up the services. With a `DATABASE_URL` the job queue is backed by
/// Postgres (schema applied on startup); without one everything runs
/// in-memory, which is also what the test servers use.
pub async fn build_services(database_url: Option<&str>) -> anyhow::Result<AppServices> {
    let job_store: Arc<dyn JobStore> = match database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(8).connect(url).await?;
            let store = PgJobStore::new(pool);
            store.ensure_schema().await?;
            tracing::info!("job queue backed by postgres");
            Arc::new(store)
        }
        None => {
            tracing::info!("no DATABASE_URL; job queue is in-memory");
            Arc::new(InMemoryJobStore::new())
        }
    };

    Ok(build_with_store(job_store))
}

/// Assemble services around an already-constructed job store.
pub fn build_with_store(job_store: Arc<dyn JobStore>) -> AppServices {
    let applications: Arc<dyn ApplicationStore> = Arc::new(InMemoryApplicationStore::new());
    let resumes: Arc<dyn ResumeStore> = Arc::new(InMemoryResumeStore::new());
    let timeline: Arc<dyn TimelineStore> = Arc::new(InMemoryTimelineStore::new());
    let queue = Arc::new(QueueManager::new(job_store));

    let fetch_results: Arc<dyn ResultProcessor> = Arc::new(FetchResults::new(
        applications.clone(),
        timeline.clone(),
        queue.clone(),
    ));
    let parse_results: Arc<dyn ResultProcessor> =
        Arc::new(ParseResults::new(resumes.clone(), timeline.clone()));
    let analyze_results: Arc<dyn ResultProcessor> =
        Arc::new(AnalyzeResults::new(applications.clone(), timeline.clone()));

    AppServices {
        applications,
        resumes,
        timeline,
        queue,
        fetch_results,
        parse_results,
        analyze_results,
    }
}
