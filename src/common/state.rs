// Application state shared across all modules

use reqwest::Client;
use sqlx::PgPool;

use crate::common::config::Config;

/// Application state containing the database pool, HTTP client, and
/// configuration. Constructed once in `main` and injected via `Extension`
/// so handlers never reach for process-global state.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub http: Client,
    pub config: Config,
}
