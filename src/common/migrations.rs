// src/common/migrations.rs
//! Database schema management
//!
//! The API owns the schema for the three tables this system assumes: `users`,
//! `background_jobs`, and `failed_jobs`. Everything else in the database is
//! caller-defined and only ever touched through the generic SQL gateway.

use sqlx::PgPool;
use tracing::info;

/// Create the core tables and indexes if they do not exist yet.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    create_users_table(pool).await?;
    create_job_tables(pool).await?;
    create_indexes(pool).await?;

    info!("Database migration completed");
    Ok(())
}

async fn create_users_table(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            provider TEXT NOT NULL DEFAULT 'email',
            provider_id TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_sign_in TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_job_tables(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS background_jobs (
            id BIGSERIAL PRIMARY KEY,
            job_type TEXT NOT NULL,
            data JSONB NOT NULL DEFAULT '{}'::jsonb,
            retries INTEGER NOT NULL DEFAULT 0,
            last_retry TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Terminal failures are copied here once the retry budget is spent, then
    // pruned to the configured retention count.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS failed_jobs (
            id BIGINT PRIMARY KEY,
            job_type TEXT NOT NULL,
            data JSONB NOT NULL DEFAULT '{}'::jsonb,
            retries INTEGER NOT NULL,
            error TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            failed_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_background_jobs_type ON background_jobs (job_type, id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_failed_jobs_failed_at ON failed_jobs (failed_at)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_provider ON users (provider, provider_id)")
        .execute(pool)
        .await?;

    Ok(())
}
