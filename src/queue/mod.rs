//! Background job queue
//!
//! Postgres-backed work queue with at-least-once delivery: the API enqueues
//! rows into `background_jobs`, the worker process claims them under
//! `FOR UPDATE SKIP LOCKED` and either deletes them on success or bumps the
//! retry counter until the budget is spent.

pub mod handlers;
pub mod models;
pub mod routes;
pub mod storage;

pub use routes::queue_routes;
