//! IronDB Studio API
//!
//! A thin Postgres admin backend: Google OAuth sign-in with JWT session
//! tokens, an arbitrary-SQL gateway for the studio console, and a
//! Postgres-backed background job queue processed by a separate worker
//! binary.

pub mod auth;
pub mod common;
pub mod query;
pub mod queue;
pub mod rate_limit_middleware;
pub mod security_headers;
pub mod worker;
