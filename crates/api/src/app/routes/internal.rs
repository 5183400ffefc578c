//! Worker-facing surface: dequeue and outcome callbacks.
//!
//! Fetch, parse, and analyze executors run as separate processes; they claim
//! work with `POST /internal/jobs/dequeue` and report outcomes through the
//! callback routes. Callbacks are idempotent: a duplicate or late report is
//! acknowledged with 200 and changes nothing.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;
use tracing::warn;

use jobtrail_core::JobId;
use jobtrail_infra::jobs::{ErrorKind, FailureOutcome, JobClass, JobOutcome, ReportAck};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/jobs/dequeue", post(dequeue))
        .route("/jobs/:id/complete", post(complete))
        .route("/jobs/:id/fail", post(fail))
}

#[derive(Debug, Deserialize)]
pub struct DequeueRequest {
    pub class: JobClass,
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    pub kind: ErrorKind,
    #[serde(default)]
    pub message: String,
}

/// Claim the next eligible job of a class. 204 when the queue is empty.
pub async fn dequeue(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<DequeueRequest>,
) -> axum::response::Response {
    match services.queue.dequeue(body.class).await {
        Ok(Some(job)) => (StatusCode::OK, Json(dto::job_to_json(&job))).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::queue_error_to_response(e),
    }
}

/// Success callback. The outcome's class must match the job's; the result
/// processor then links the artifact onto the parent.
pub async fn complete(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(outcome): Json<JobOutcome>,
) -> axum::response::Response {
    let Ok(job_id) = id.parse::<JobId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id");
    };

    let job = match services.queue.get(job_id).await {
        Ok(Some(job)) => Some(job),
        Ok(None) => None,
        Err(e) => return errors::queue_error_to_response(e),
    };
    if let Some(job) = &job {
        if job.class() != outcome.class() {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "class_mismatch",
                format!("job is {}, outcome is {}", job.class(), outcome.class()),
            );
        }
    }

    let ack = match services.queue.report_success(job_id, outcome.result_ref()).await {
        Ok(ack) => ack,
        Err(e) => return errors::queue_error_to_response(e),
    };

    let status = match (ack, job) {
        (ReportAck::Applied, Some(job)) => {
            // A store failure here must not fail the callback; the job is
            // already complete and the link is recoverable from job history.
            if let Err(e) = services
                .results_for(outcome.class())
                .process_success(&job, &outcome)
                .await
            {
                warn!(job_id = %job_id, error = %e, "result processing failed; job remains complete");
            }
            "applied"
        }
        (ReportAck::Applied, None) => "applied",
        (ReportAck::AlreadyTerminal, _) => "duplicate",
        (ReportAck::UnknownJob, _) => "unknown_job",
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({ "job_id": job_id, "status": status })),
    )
        .into_response()
}

/// Failure callback. The retry policy decides between a backoff requeue and
/// a terminal failure; only the latter reaches the parent's timeline.
pub async fn fail(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<FailRequest>,
) -> axum::response::Response {
    let Ok(job_id) = id.parse::<JobId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid job id");
    };

    let outcome = match services
        .queue
        .report_failure(job_id, body.kind, body.message)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return errors::queue_error_to_response(e),
    };

    let body = match outcome {
        FailureOutcome::Retried { retry_after, .. } => {
            serde_json::json!({ "job_id": job_id, "status": "retry_scheduled", "retry_after": retry_after })
        }
        FailureOutcome::Failed { job } => {
            if let Err(e) = services.results_for(job.class()).process_failure(&job).await {
                warn!(job_id = %job_id, error = %e, "failure recording failed; job remains failed");
            }
            serde_json::json!({ "job_id": job_id, "status": "failed" })
        }
        FailureOutcome::AlreadyTerminal => {
            serde_json::json!({ "job_id": job_id, "status": "duplicate" })
        }
        FailureOutcome::UnknownJob => {
            serde_json::json!({ "job_id": job_id, "status": "unknown_job" })
        }
    };

    (StatusCode::OK, Json(body)).into_response()
}
