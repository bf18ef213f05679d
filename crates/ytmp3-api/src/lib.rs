//! Axum HTTP API server.
//!
//! This crate provides:
//! - `POST /download` streaming conversion progress as server-sent events
//! - Per-IP rate limiting and security headers
//! - Health/readiness checks and Prometheus metrics
//! - Static serving of the frontend and completed files

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod sse;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
