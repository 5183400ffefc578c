use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use jobtrail_core::JobId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:id", get(get_job))
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Ok(job_id) = id.parse::<JobId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id");
    };
    match services.queue.get(job_id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(dto::job_to_json(&job))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "job not found"),
        Err(e) => errors::queue_error_to_response(e),
    }
}

/// Per-class queue depth and oldest-pending age, for monitoring.
pub async fn queue_status(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.queue.queue_status().await {
        Ok(status) => {
            let items: Vec<_> = status.iter().map(dto::queue_status_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "queues": items }))).into_response()
        }
        Err(e) => errors::queue_error_to_response(e),
    }
}
