use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use jobtrail_core::ResumeId;
use jobtrail_infra::jobs::JobPayload;
use jobtrail_tracker::Resume;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_resume))
        .route("/:id", get(get_resume).delete(delete_resume))
        .route("/:id/timeline", get(get_timeline))
}

/// Register an uploaded resume and enqueue its parse job.
pub async fn create_resume(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateResumeRequest>,
) -> axum::response::Response {
    let resume = Resume::new(body.original_name, body.file_path.clone());
    let resume_id = resume.id;
    if let Err(e) = services.resumes.insert(resume.clone()).await {
        return errors::store_error_to_response(e);
    }

    let payload = JobPayload::Parse {
        file_path: body.file_path,
    };
    let parse_job_id = match services
        .queue
        .enqueue(*resume_id.as_uuid(), payload, body.priority)
        .await
    {
        Ok(id) => id,
        Err(e) => return errors::queue_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "resume": dto::resume_to_json(&resume),
            "parse_job_id": parse_job_id,
        })),
    )
        .into_response()
}

pub async fn get_resume(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(resume_id) = parse_id(&id) else {
        return invalid_id();
    };
    match services.resumes.load(resume_id).await {
        Ok(Some(resume)) if resume.is_live() => {
            (StatusCode::OK, Json(dto::resume_to_json(&resume))).into_response()
        }
        Ok(_) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "resume not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Soft-delete the resume and cancel a pending parse.
pub async fn delete_resume(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(resume_id) = parse_id(&id) else {
        return invalid_id();
    };
    let mut resume = match services.resumes.load(resume_id).await {
        Ok(Some(resume)) if resume.is_live() => resume,
        Ok(_) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "resume not found"),
        Err(e) => return errors::store_error_to_response(e),
    };

    resume.soft_delete();
    if let Err(e) = services.resumes.update(&resume).await {
        return errors::store_error_to_response(e);
    }
    let cancelled = match services.queue.purge_for_parent(*resume_id.as_uuid()).await {
        Ok(n) => n,
        Err(e) => return errors::queue_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({ "id": resume_id, "cancelled_jobs": cancelled })),
    )
        .into_response()
}

pub async fn get_timeline(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(resume_id) = parse_id(&id) else {
        return invalid_id();
    };
    match services.timeline.list(*resume_id.as_uuid()).await {
        Ok(events) => {
            let items: Vec<_> = events.iter().map(dto::event_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

fn parse_id(raw: &str) -> Option<ResumeId> {
    raw.parse().ok()
}

fn invalid_id() -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid resume id")
}
