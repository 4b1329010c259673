//! Redis-backed job queue and ProgressStream transport.
//!
//! This crate provides:
//! - Job enqueueing via Redis Streams, with consumer groups, a dead letter
//!   queue, and idempotency/dedup keys
//! - Worker consumption with retry counters and stale-claim recovery
//! - The ProgressStream transport: `ProgressEvent` delivery via Redis
//!   Pub/Sub, mirrored into a sorted-set history and a fast-polling
//!   `JobStatusCache`

pub mod error;
pub mod job;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{GenerateVideoJob, QueueJob, RegenerateSceneJob};
pub use progress::{
    ProgressBus, ProgressEnvelope, HEARTBEAT_TTL_SECS, JOB_STATUS_TTL_SECS,
    PROGRESS_HISTORY_TTL_SECS,
};
pub use queue::{JobQueue, QueueConfig};
