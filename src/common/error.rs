// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::error;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    InternalServer(String),
    DatabaseError(sqlx::Error),
    QueueError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
            ApiError::QueueError(msg) => write!(f, "Queue Error: {}", msg),
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        // Upstream failures surface the driver text under `message`, the key
        // SQL gateway clients read. Everything else keeps `{error, code}`.
        let (status, body) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, error_body(msg, "UNAUTHORIZED")),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, error_body(msg, "FORBIDDEN")),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg, "BAD_REQUEST")),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg, "NOT_FOUND")),
            ApiError::InternalServer(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(msg, "INTERNAL_SERVER_ERROR"),
            ),
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                // Operator-facing admin tool: the driver message is surfaced
                // verbatim so the caller sees exactly what Postgres rejected.
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "message": e.to_string() }),
                )
            }
            ApiError::QueueError(msg) => {
                error!(error = %msg, "Queue error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "message": msg }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(error: String, code: &str) -> serde_json::Value {
    serde_json::json!(ErrorResponse {
        error,
        code: code.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn response_parts(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_database_error_body_carries_message() {
        let (status, body) = response_parts(ApiError::DatabaseError(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().contains("no rows"));
    }

    #[tokio::test]
    async fn test_queue_error_body_carries_message() {
        let (status, body) =
            response_parts(ApiError::QueueError("enqueue failed".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "enqueue failed");
    }

    #[tokio::test]
    async fn test_auth_errors_keep_error_and_code() {
        let (status, body) =
            response_parts(ApiError::Unauthorized("No token provided".to_string())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "No token provided");
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}
