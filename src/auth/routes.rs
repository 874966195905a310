//! Authentication routes

use axum::{routing::get, Router};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/google` - Redirect to Google's authorization page
/// - `GET /auth/google/callback` - OAuth callback; redirects to the frontend with `?token=&user=`
/// - `GET /api/me` - Get current user information
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/google", get(handlers::google_oauth_start))
        .route("/auth/google/callback", get(handlers::google_oauth_callback))
        .route("/api/me", get(handlers::me_handler))
}
