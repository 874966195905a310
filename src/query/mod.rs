//! SQL gateway module
//!
//! Full SQL pass-through for the studio's console and table browser, gated
//! only by possession of a valid session token.

pub mod handlers;
pub mod models;
pub mod routes;

pub use routes::query_routes;
