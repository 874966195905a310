//! Job dispatch handlers

use axum::extract::{Extension, Json};
use std::sync::Arc;
use tracing::{info, warn};

use super::models::EnqueueRequest;
use super::storage;
use crate::auth::AuthedUser;
use crate::common::{ApiError, AppState};

/// POST /api/enqueue
/// Accepts a task and puts it on the queue. "queued" means accepted, not run;
/// the worker process picks it up asynchronously.
pub async fn enqueue_job(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let task_type = req.task_type.unwrap_or_else(|| "default".to_string());

    let payload = if req.payload.is_null() {
        serde_json::json!({})
    } else {
        req.payload
    };

    let job_id = storage::enqueue(&state.db, &task_type, &payload)
        .await
        .map_err(|e| {
            warn!(error = %e, task_type = %task_type, "Failed to enqueue job");
            ApiError::QueueError(e.to_string())
        })?;

    info!(
        job_id = job_id,
        task_type = %task_type,
        user_id = %authed.id,
        "Job enqueued"
    );

    Ok(Json(serde_json::json!({
        "status": "queued",
        "message": "Task sent to worker",
        "jobId": job_id,
    })))
}

/// GET /api/jobs/failed
/// Lists retained terminal failures, newest first
pub async fn list_failed_jobs(
    Extension(state): Extension<Arc<AppState>>,
    _authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = storage::recent_failed_jobs(&state.db, state.config.max_failed_jobs)
        .await
        .map_err(ApiError::DatabaseError)?;

    Ok(Json(serde_json::json!({ "rows": rows })))
}
