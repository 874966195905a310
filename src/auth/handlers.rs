//! Authentication handlers
//!
//! Google OAuth sign-in: `/auth/google` redirects the operator to Google,
//! `/auth/google/callback` exchanges the authorization code, validates the
//! returned id_token, upserts the user row, and hands a 24-hour JWT back to
//! the frontend via redirect query parameters.

use axum::extract::{Extension, Json, Query};
use axum::response::Redirect;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::extractors::AuthedUser;
use super::models::{Claims, GoogleTokenResponse, User, ROLE_AUTHENTICATED};
use crate::common::helpers::{safe_email_log, safe_token_log};
use crate::common::{ApiError, AppState};

/// GET /auth/google - Start Google OAuth flow
/// Redirects the operator to Google's authorization page
pub async fn google_oauth_start(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Redirect, ApiError> {
    let client_id = state.config.google_client_id.as_deref().ok_or_else(|| {
        error!("GOOGLE_CLIENT_ID is not configured");
        ApiError::InternalServer("google oauth is not configured".to_string())
    })?;

    let auth_url = format!(
        "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}",
        urlencoding::encode(client_id),
        urlencoding::encode(&state.config.google_redirect_uri),
        urlencoding::encode("openid email profile"),
    );

    info!("Starting Google OAuth flow");
    Ok(Redirect::to(&auth_url))
}

/// GET /auth/google/callback - Handle OAuth callback from Google
///
/// Exchanges the authorization code for tokens, validates the id_token,
/// upserts the user record, and redirects to the frontend with
/// `?token=<jwt>&user=<email>`.
pub async fn google_oauth_callback(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Redirect, ApiError> {
    if let Some(oauth_error) = params.get("error") {
        warn!(oauth_error = %oauth_error, "Google OAuth returned error");
        return Err(ApiError::Unauthorized(format!(
            "google sign-in failed: {}",
            oauth_error
        )));
    }

    let code = params.get("code").ok_or_else(|| {
        warn!("No authorization code in OAuth callback");
        ApiError::BadRequest("No authorization code provided".to_string())
    })?;

    debug!("Received OAuth callback with authorization code");

    let id_token = exchange_code(&state, code).await?;
    let (email, google_id) = verify_id_token(&state, &id_token).await?;

    let user = upsert_user(&state.db, &email, "google", &google_id).await?;
    let token = mint_token(&state.config.jwt_secret, &user)?;

    info!(
        user_id = user.id,
        email = %safe_email_log(&user.email),
        token = %safe_token_log(&token),
        provider = "google",
        "User authentication successful via Google OAuth"
    );

    let redirect_url = format!(
        "{}?token={}&user={}",
        state.config.frontend_url,
        token,
        urlencoding::encode(&user.email),
    );
    Ok(Redirect::to(&redirect_url))
}

/// GET /api/me
/// Returns the current authenticated user's row
pub async fn me_handler(
    Extension(state): Extension<Arc<AppState>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id: i64 = authed
        .id
        .parse()
        .map_err(|_| ApiError::Forbidden("Invalid token".to_string()))?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::DatabaseError)?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    Ok(Json(serde_json::json!({ "user": user })))
}

// ---- Helper Functions ----

/// Exchange an authorization code for an id_token at Google's token endpoint
async fn exchange_code(state: &AppState, code: &str) -> Result<String, ApiError> {
    let client_id = state
        .config
        .google_client_id
        .as_deref()
        .ok_or_else(|| ApiError::InternalServer("google oauth is not configured".to_string()))?;
    let client_secret = state
        .config
        .google_client_secret
        .as_deref()
        .ok_or_else(|| ApiError::InternalServer("google oauth is not configured".to_string()))?;

    let form = [
        ("code", code),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("redirect_uri", state.config.google_redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];

    let resp = state
        .http
        .post("https://oauth2.googleapis.com/token")
        .form(&form)
        .send()
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP error contacting Google token endpoint");
            ApiError::InternalServer("google token exchange unavailable".to_string())
        })?;

    if !resp.status().is_success() {
        warn!(http_status = %resp.status(), "Google token exchange rejected the code");
        return Err(ApiError::Unauthorized(
            "authorization code rejected".to_string(),
        ));
    }

    let tokens: GoogleTokenResponse = resp.json().await.map_err(|e| {
        error!(error = %e, "Failed to parse Google token response");
        ApiError::InternalServer("malformed google token response".to_string())
    })?;

    Ok(tokens.id_token)
}

/// Validate an id_token with Google's tokeninfo endpoint and extract the
/// verified identity (email + Google subject id).
///
/// Docs: https://developers.google.com/identity/sign-in/web/backend-auth
async fn verify_id_token(state: &AppState, id_token: &str) -> Result<(String, String), ApiError> {
    let tokeninfo_url = format!(
        "https://oauth2.googleapis.com/tokeninfo?id_token={}",
        id_token
    );

    let resp = state.http.get(&tokeninfo_url).send().await.map_err(|e| {
        error!(error = %e, "HTTP error contacting Google tokeninfo endpoint");
        ApiError::InternalServer("google token validation service unavailable".to_string())
    })?;

    if !resp.status().is_success() {
        warn!(http_status = %resp.status(), "Google tokeninfo rejected the id_token");
        return Err(ApiError::Unauthorized(
            "expired or invalid id_token".to_string(),
        ));
    }

    let body: serde_json::Value = resp.json().await.map_err(|e| {
        error!(error = %e, "Failed to parse Google tokeninfo response");
        ApiError::BadRequest("malformed id_token".to_string())
    })?;

    let email = body.get("email").and_then(|v| v.as_str());
    let sub = body.get("sub").and_then(|v| v.as_str());

    let (email, sub) = match (email, sub) {
        (Some(e), Some(s)) => (e.to_string(), s.to_string()),
        _ => {
            warn!(
                has_email = email.is_some(),
                has_sub = sub.is_some(),
                "Google token missing required fields (email/sub)"
            );
            return Err(ApiError::BadRequest(
                "token missing required fields".to_string(),
            ));
        }
    };

    // Validate audience (client id) when configured
    if let Some(client_id) = &state.config.google_client_id {
        match body.get("aud").and_then(|v| v.as_str()) {
            Some(aud) if aud == client_id => {
                debug!("Google token audience validation successful");
            }
            Some(aud) => {
                warn!(token_audience = %aud, "Google token audience mismatch - rejecting token");
                return Err(ApiError::Unauthorized("token audience mismatch".to_string()));
            }
            None => {
                warn!("Google token missing audience field - rejecting token");
                return Err(ApiError::Unauthorized("token missing audience".to_string()));
            }
        }
    }

    Ok((email, sub))
}

/// Upsert a user keyed on email: insert on first sign-in, touch
/// `last_sign_in` on every subsequent one. A single atomic statement, so a
/// failure leaves no partial state behind.
pub async fn upsert_user(
    pool: &PgPool,
    email: &str,
    provider: &str,
    provider_id: &str,
) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, provider, provider_id, last_sign_in)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (email) DO UPDATE SET last_sign_in = NOW()
        RETURNING *
        "#,
    )
    .bind(email)
    .bind(provider)
    .bind(provider_id)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        error!(
            error = %e,
            email = %safe_email_log(email),
            provider = %provider,
            "Database error upserting user during sign-in"
        );
        ApiError::DatabaseError(e)
    })
}

/// Mint a signed 24-hour session token for a user
pub fn mint_token(jwt_secret: &str, user: &User) -> Result<String, ApiError> {
    let exp = (Utc::now() + Duration::hours(24)).timestamp() as usize;
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: ROLE_AUTHENTICATED.to_string(),
        exp,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| {
        error!(error = %e, user_id = user.id, "JWT encoding error during authentication");
        ApiError::InternalServer("jwt error".to_string())
    })
}
