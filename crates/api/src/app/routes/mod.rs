use axum::{Router, routing::get};

pub mod applications;
pub mod internal;
pub mod jobs;
pub mod resumes;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .route("/queues", get(jobs::queue_status))
        .nest("/applications", applications::router())
        .nest("/resumes", resumes::router())
        .nest("/jobs", jobs::router())
        .nest("/internal", internal::router())
}
