//! Job worker
//!
//! Runs as its own process with its own connection pool, separate from the
//! API's, so heavy jobs never starve interactive queries. A fixed number of
//! claim loops run concurrently; each claims the next ready job under
//! `FOR UPDATE SKIP LOCKED`, dispatches it by task type, and reports the
//! outcome back to the queue tables.

pub mod handlers;

use rand::Rng;
use sqlx::PgPool;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

use crate::queue::storage;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_JITTER: Duration = Duration::from_millis(100);

/// Connections the worker's pool needs for `concurrency` claim loops: each
/// loop holds one connection for the claim transaction while its handler
/// acquires a second for the job's own work, plus one spare.
pub fn pool_size(concurrency: usize) -> u32 {
    (concurrency * 2 + 1) as u32
}

#[derive(Clone)]
pub struct Worker {
    pool: PgPool,
    max_job_retries: i32,
    max_failed_jobs: i64,
    poll_interval: Duration,
    jitter: Duration,
}

impl Worker {
    pub fn new(pool: PgPool, max_job_retries: i32, max_failed_jobs: i64) -> Self {
        Self {
            pool,
            max_job_retries,
            max_failed_jobs,
            poll_interval: DEFAULT_POLL_INTERVAL,
            jitter: DEFAULT_JITTER,
        }
    }

    /// Spawn `concurrency` claim loops, returning their join handles
    pub fn start(&self, concurrency: usize) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(concurrency);
        for i in 1..=concurrency {
            let name = format!("job-worker-{i}");
            info!(worker.name = %name, "Starting worker");

            let worker = self.clone();
            let span = info_span!("worker", worker.name = %name);
            handles.push(tokio::spawn(async move { worker.run().instrument(span).await }));
        }
        handles
    }

    /// Calculate the idle sleep duration with random jitter applied, so
    /// concurrent loops don't poll in lockstep.
    fn sleep_duration_with_jitter(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.poll_interval;
        }

        let jitter_millis = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let random_jitter = rand::thread_rng().gen_range(0..=jitter_millis);
        self.poll_interval + Duration::from_millis(random_jitter)
    }

    /// Run jobs forever
    pub async fn run(&self) {
        loop {
            match self.run_next_job().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    let sleep_duration = self.sleep_duration_with_jitter();
                    trace!("No pending jobs found. Polling again in {sleep_duration:?}");
                    sleep(sleep_duration).await;
                }
                Err(err) => {
                    error!("Failed to run job: {err}");
                    sleep(self.sleep_duration_with_jitter()).await;
                }
            }
        }
    }

    /// Run the next job in the queue, if there is one.
    ///
    /// Returns:
    /// - `Ok(Some(job_id))` if a job was run
    /// - `Ok(None)` if no jobs were waiting
    /// - `Err(...)` if there was an error retrieving the job
    async fn run_next_job(&self) -> anyhow::Result<Option<i64>> {
        // The transaction holds the row lock while the job runs
        let mut tx = self.pool.begin().await?;

        let job = match storage::find_next_unlocked_job_tx(&mut tx).await {
            Ok(job) => job,
            Err(sqlx::Error::RowNotFound) => {
                tx.rollback().await?;
                return Ok(None);
            }
            Err(e) => {
                tx.rollback().await?;
                return Err(e.into());
            }
        };

        let span = info_span!("job", job.id = job.id, job.job_type = %job.job_type);
        let job_id = job.id;

        let result = handlers::run_job(&self.pool, &job).instrument(span.clone()).await;

        let _enter = span.enter();
        match result {
            Ok(()) => {
                debug!("Deleting successful job");
                storage::delete_successful_job(&mut tx, job_id).await?;
                tx.commit().await?;
            }
            Err(err) => {
                if job.retries + 1 >= self.max_job_retries {
                    warn!("Job failed permanently after {} attempts: {err}", job.retries + 1);
                    storage::move_job_to_failed(&mut tx, job_id, &err.to_string(), self.max_failed_jobs)
                        .await?;
                } else {
                    warn!("Failed to run job, will retry: {err}");
                    storage::update_failed_job(&mut tx, job_id).await?;
                }
                tx.commit().await?;
            }
        }

        Ok(Some(job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool")
    }

    // connect_lazy still needs a Tokio reactor to hand out handles
    #[tokio::test]
    async fn test_jitter_stays_within_bounds() {
        let worker = Worker::new(lazy_pool(), 5, 5000);
        for _ in 0..100 {
            let d = worker.sleep_duration_with_jitter();
            assert!(d >= DEFAULT_POLL_INTERVAL);
            assert!(d <= DEFAULT_POLL_INTERVAL + DEFAULT_JITTER);
        }
    }

    #[tokio::test]
    async fn test_zero_jitter_returns_poll_interval() {
        let mut worker = Worker::new(lazy_pool(), 5, 5000);
        worker.jitter = Duration::ZERO;
        assert_eq!(worker.sleep_duration_with_jitter(), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_pool_size_covers_claim_and_handler_connections() {
        // Every loop can hold a claim transaction and a handler connection
        // at the same time without exhausting the pool.
        assert_eq!(pool_size(5), 11);
        assert_eq!(pool_size(1), 3);
        assert!(pool_size(5) >= 2 * 5 + 1);
    }
}
