//! Authentication module
//!
//! Google OAuth sign-in, JWT session tokens, and the bearer-token gate that
//! every protected route passes through.

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;

#[cfg(test)]
mod tests;

pub use extractors::AuthedUser;
pub use routes::auth_routes;
