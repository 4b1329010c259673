//! JobStore: the durable record of every generation/regeneration job and
//! its scenes, backed by the Firestore REST API.
//!
//! Production-grade client with:
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter
//! - Observability (tracing spans, metrics)
//!
//! ## Modules
//! - `client` - Main Firestore REST API client
//! - `token_cache` - Thread-safe access token caching
//! - `retry` - Retry policy with exponential backoff
//! - `metrics` - Prometheus metrics collection
//! - `job_repo` / `scene_repo` - Typed repositories for Jobs and Scenes
//! - `convert` - Struct <-> Firestore document field conversion
//! - `types` - Firestore document types and value conversions

pub mod client;
pub mod convert;
pub mod error;
pub mod job_repo;
pub mod metrics;
pub mod retry;
pub mod scene_repo;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use convert::{from_document, to_fields};
pub use error::{FirestoreError, FirestoreResult};
pub use job_repo::{JobPage, JobQuery, JobRepository};
pub use retry::RetryConfig;
pub use scene_repo::SceneRepository;
pub use token_cache::TokenCache;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
