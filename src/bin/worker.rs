// src/bin/worker.rs
//! Background job worker process
//!
//! Connects with its own pool, deliberately separate from the API's, and runs
//! a fixed number of concurrent claim loops until interrupted.

use dotenv::dotenv;
use futures_util::future::join_all;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use irondb_api::common::Config;
use irondb_api::queue::storage;
use irondb_api::worker::{self, Worker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(worker::pool_size(config.worker_concurrency))
        .connect(&config.database_url)
        .await?;

    let pending = storage::pending_job_count(&pool).await.unwrap_or(0);
    info!(
        concurrency = config.worker_concurrency,
        max_retries = config.max_job_retries,
        pending_jobs = pending,
        "Worker started, listening for jobs"
    );

    let worker = Worker::new(pool, config.max_job_retries, config.max_failed_jobs);
    let handles = worker.start(config.worker_concurrency);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping workers");
        }
        _ = async {
            join_all(handles).await.into_iter().for_each(|result| {
                if let Err(error) = result {
                    warn!(%error, "Worker task panicked");
                }
            });
        } => {}
    }

    Ok(())
}
