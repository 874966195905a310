//! Job queue routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Create the job queue router
///
/// # Routes
/// - `POST /api/enqueue` - Put a task on the work queue
/// - `GET /api/jobs/failed` - List retained terminal failures
pub fn queue_routes() -> Router {
    Router::new()
        .route("/api/enqueue", post(handlers::enqueue_job))
        .route("/api/jobs/failed", get(handlers::list_failed_jobs))
}
