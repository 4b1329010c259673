//! Axum HTTP/WebSocket API for the ad-video generation orchestrator.
//!
//! This crate provides:
//! - `POST /generate`, `GET /jobs`, `GET /jobs/{id}`, `DELETE /jobs/{id}`,
//!   and `POST /jobs/{id}/scenes/{n}/regenerate` against the durable
//!   `Job` record
//! - `GET /jobs/{id}/progress`, the ProgressStream WebSocket
//! - Firebase ID token verification and per-owner Admission rate limiting
//! - Prometheus metrics

pub mod admission;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
