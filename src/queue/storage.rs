//! Queue persistence
//!
//! The queue lives in two Postgres tables: `background_jobs` holds pending
//! work, claimed with `FOR UPDATE SKIP LOCKED` so concurrent workers never
//! double-run a job, and `failed_jobs` retains terminal failures up to a
//! configured count.

use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{BackgroundJob, FailedJob};

/// Insert one job, returning its queue-assigned id
pub async fn enqueue(pool: &PgPool, job_type: &str, data: &Value) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO background_jobs (job_type, data) VALUES ($1, $2) RETURNING id",
    )
    .bind(job_type)
    .bind(data)
    .fetch_one(pool)
    .await
}

/// Finds the next job that is unlocked and ready to run.
///
/// A job is ready if it has never been tried, or its exponential backoff
/// window (1 minute doubling per retry) has elapsed. The row lock is held by
/// the caller's transaction for the duration of the job run.
pub async fn find_next_unlocked_job_tx(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<BackgroundJob, sqlx::Error> {
    sqlx::query_as::<_, BackgroundJob>(
        r"
        SELECT id, job_type, data, retries, last_retry, created_at
        FROM background_jobs
        WHERE last_retry IS NULL
           OR last_retry < NOW() - INTERVAL '1 minute' * POWER(2, retries)
        ORDER BY id ASC
        FOR UPDATE SKIP LOCKED
        LIMIT 1
        ",
    )
    .fetch_one(&mut **tx)
    .await
}

/// Deletes a job that has successfully completed running
pub async fn delete_successful_job(
    tx: &mut Transaction<'_, Postgres>,
    job_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM background_jobs WHERE id = $1")
        .bind(job_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Marks that we just tried and failed to run a job, scheduling the next
/// attempt via the backoff window in the claim query.
pub async fn update_failed_job(
    tx: &mut Transaction<'_, Postgres>,
    job_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE background_jobs SET retries = retries + 1, last_retry = NOW() WHERE id = $1",
    )
    .bind(job_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Moves a job whose retry budget is spent into `failed_jobs`, recording the
/// final error, and prunes the retained set down to `max_failed_jobs` rows.
pub async fn move_job_to_failed(
    tx: &mut Transaction<'_, Postgres>,
    job_id: i64,
    error: &str,
    max_failed_jobs: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO failed_jobs (id, job_type, data, retries, error, created_at)
        SELECT id, job_type, data, retries + 1, $2, created_at
        FROM background_jobs
        WHERE id = $1
        ",
    )
    .bind(job_id)
    .bind(error)
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM background_jobs WHERE id = $1")
        .bind(job_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query(
        r"
        DELETE FROM failed_jobs
        WHERE id NOT IN (
            SELECT id FROM failed_jobs ORDER BY failed_at DESC LIMIT $1
        )
        ",
    )
    .bind(max_failed_jobs)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Newest-first listing of retained failure records
pub async fn recent_failed_jobs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<FailedJob>, sqlx::Error> {
    sqlx::query_as::<_, FailedJob>(
        "SELECT id, job_type, data, retries, error, created_at, failed_at
         FROM failed_jobs ORDER BY failed_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// The number of jobs currently waiting in the queue
pub async fn pending_job_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM background_jobs")
        .fetch_one(pool)
        .await
}
