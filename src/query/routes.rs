//! SQL gateway routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Create the SQL gateway router
///
/// # Routes
/// - `POST /api/query` - Execute an arbitrary SQL statement
/// - `GET /api/tables` - List user tables with approximate row counts
pub fn query_routes() -> Router {
    Router::new()
        .route("/api/query", post(handlers::execute_query))
        .route("/api/tables", get(handlers::list_tables))
}
