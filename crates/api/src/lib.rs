//! HTTP API layer for opine.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: feed pagination, results, summaries, vote casting
//! - **Extractors**: caller identity
//! - **Middleware**: identity propagation from the fronting auth layer
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
