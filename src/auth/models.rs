//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Role embedded in every token this API issues.
pub const ROLE_AUTHENTICATED: &str = "authenticated";

/// JWT claims structure
#[derive(Serialize, Deserialize, Debug)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

/// User database model
#[derive(FromRow, Serialize, Deserialize, Debug)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub provider: String,
    pub provider_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_sign_in: DateTime<Utc>,
}

/// Token response from Google's OAuth token endpoint
#[derive(Deserialize)]
pub struct GoogleTokenResponse {
    pub id_token: String,
}
