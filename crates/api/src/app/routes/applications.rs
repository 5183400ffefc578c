use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use jobtrail_core::ApplicationId;
use jobtrail_tracker::{Application, TimelineEvent, TimelineEventType};
use jobtrail_infra::jobs::JobPayload;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_application).get(list_applications))
        .route("/:id", get(get_application).delete(delete_application))
        .route("/:id/status", post(update_status))
        .route("/:id/analyze", post(enqueue_analysis))
        .route("/:id/timeline", get(get_timeline))
        .route("/:id/jobs", get(get_jobs))
}

/// Create an application. A posting URL enqueues a fetch job; blank
/// company/title fields get placeholders and the review flag.
pub async fn create_application(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateApplicationRequest>,
) -> axum::response::Response {
    let mut app = Application::new(
        body.company_name,
        body.job_title,
        body.posting_url.clone(),
        body.applied_on,
        body.source,
    )
    .with_auto_analyze(body.auto_analyze);
    if let Some(resume_id) = body.resume_id {
        app = app.with_resume(resume_id);
    }
    app.notes = body.notes;

    let app_id = app.id;
    if let Err(e) = services.applications.insert(app.clone()).await {
        return errors::store_error_to_response(e);
    }

    if let Err(e) = services
        .timeline
        .append(TimelineEvent::new(
            *app_id.as_uuid(),
            TimelineEventType::ApplicationCreated,
            serde_json::json!({ "source": app.source }),
        ))
        .await
    {
        return errors::store_error_to_response(e);
    }

    let mut fetch_job_id = None;
    if let Some(url) = body.posting_url {
        match services
            .queue
            .enqueue(*app_id.as_uuid(), JobPayload::Fetch { url }, body.priority)
            .await
        {
            Ok(id) => fetch_job_id = Some(id),
            Err(e) => return errors::queue_error_to_response(e),
        }
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "application": dto::application_to_json(&app),
            "fetch_job_id": fetch_job_id,
        })),
    )
        .into_response()
}

pub async fn list_applications(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.applications.list().await {
        Ok(apps) => {
            let items: Vec<_> = apps.iter().map(dto::application_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_application(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(app_id) = parse_id(&id) else {
        return invalid_id();
    };
    match services.applications.load(app_id).await {
        Ok(Some(app)) if app.is_live() => {
            (StatusCode::OK, Json(dto::application_to_json(&app))).into_response()
        }
        Ok(_) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "application not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Soft-delete the application and cancel its in-flight jobs. Terminal job
/// rows are kept as history.
pub async fn delete_application(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(app_id) = parse_id(&id) else {
        return invalid_id();
    };
    let mut app = match services.applications.load(app_id).await {
        Ok(Some(app)) if app.is_live() => app,
        Ok(_) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "application not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    app.soft_delete();
    if let Err(e) = services.applications.update(&app).await {
        return errors::store_error_to_response(e);
    }
    let cancelled = match services.queue.purge_for_parent(*app_id.as_uuid()).await {
        Ok(n) => n,
        Err(e) => return errors::queue_error_to_response(e),
    };
    if let Err(e) = services
        .timeline
        .append(TimelineEvent::new(
            *app_id.as_uuid(),
            TimelineEventType::ApplicationDeleted,
            serde_json::json!({ "cancelled_jobs": cancelled }),
        ))
        .await
    {
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "id": app_id, "cancelled_jobs": cancelled })),
    )
        .into_response()
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateStatusRequest>,
) -> axum::response::Response {
    let Some(app_id) = parse_id(&id) else {
        return invalid_id();
    };
    let mut app = match services.applications.load(app_id).await {
        Ok(Some(app)) if app.is_live() => app,
        Ok(_) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "application not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    app.set_status(body.status);
    if let Err(e) = services.applications.update(&app).await {
        return errors::store_error_to_response(e);
    }
    (StatusCode::OK, Json(dto::application_to_json(&app))).into_response()
}

/// Manually enqueue a match analysis, e.g. after attaching a resume.
pub async fn enqueue_analysis(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::EnqueueAnalysisRequest>,
) -> axum::response::Response {
    let Some(app_id) = parse_id(&id) else {
        return invalid_id();
    };
    let app = match services.applications.load(app_id).await {
        Ok(Some(app)) if app.is_live() => app,
        Ok(_) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "application not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    let payload = JobPayload::Analyze {
        posting_id: app.posting_id,
        resume_id: app.resume_id,
    };
    match services
        .queue
        .enqueue(*app_id.as_uuid(), payload, body.priority)
        .await
    {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "job_id": job_id })),
        )
            .into_response(),
        Err(e) => errors::queue_error_to_response(e),
    }
}

pub async fn get_timeline(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(app_id) = parse_id(&id) else {
        return invalid_id();
    };
    match services.timeline.list(*app_id.as_uuid()).await {
        Ok(events) => {
            let items: Vec<_> = events.iter().map(dto::event_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let Some(app_id) = parse_id(&id) else {
        return invalid_id();
    };
    match services.queue.jobs_for_parent(*app_id.as_uuid()).await {
        Ok(jobs) => {
            let items: Vec<_> = jobs.iter().map(dto::job_to_json).collect();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::queue_error_to_response(e),
    }
}

fn parse_id(raw: &str) -> Option<ApplicationId> {
    raw.parse().ok()
}

fn invalid_id() -> axum::response::Response {
    errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid application id")
}
