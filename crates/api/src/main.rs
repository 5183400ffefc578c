use std::sync::Arc;

use jobtrail_api::app;
use jobtrail_api::config::ApiConfig;
use jobtrail_infra::jobs::{Watchdog, WatchdogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jobtrail_observability::init();

    let config = ApiConfig::from_env();

    let services = Arc::new(app::services::build_services(config.database_url.as_deref()).await?);
    let router = app::build_app(services.clone());

    let _watchdog = Watchdog::spawn(
        services.queue.clone(),
        WatchdogConfig {
            scan_interval: config.watchdog_interval,
            staleness_threshold: config.stale_after,
        },
    );

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await?;
    Ok(())
}
