//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use tracing::{debug, warn};

use super::models::{Claims, ROLE_AUTHENTICATED};
use crate::common::{safe_email_log, ApiError, AppState};

/// Authenticated caller extractor
///
/// Validates the bearer token on every protected route. A missing header is
/// rejected 401 (no identity presented); a token that fails signature, expiry,
/// or role validation is rejected 403 (identity presented but not trusted).
/// On success the decoded claims travel with the request.
#[derive(Debug)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app_state): Extension<Arc<AppState>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        // Extract Bearer token from Authorization header
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        let token = match token {
            Some(t) => t,
            None => {
                warn!("Authentication failed: missing Authorization header");
                return Err(ApiError::Unauthorized("No token provided".to_string()));
            }
        };

        // Handle "Bearer <token>" format or raw token
        let bare_token = if let Some(rest) = token.strip_prefix("Bearer ") {
            rest.to_string()
        } else {
            token
        };

        // Validate signature and expiry
        let decoded = match decode::<Claims>(
            &bare_token,
            &DecodingKey::from_secret(app_state.config.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        ) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "JWT token validation failed");
                return Err(ApiError::Forbidden("Invalid token".to_string()));
            }
        };

        let claims = decoded.claims;

        // A valid signature is not enough; the token must carry the role
        // this API issues. Anything else is treated as untrusted.
        if claims.role != ROLE_AUTHENTICATED {
            warn!(role = %claims.role, "JWT token carries unexpected role");
            return Err(ApiError::Forbidden("Invalid token".to_string()));
        }

        debug!(
            user_id = %claims.sub,
            email = %safe_email_log(&claims.email),
            "Request authenticated"
        );

        Ok(AuthedUser {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        })
    }
}
