//! `ProgressBus`: the ProgressStream transport, over
//! Redis Pub/Sub with persistence and heartbeat support.
//!
//! This module provides:
//! - Real-time `ProgressEvent` delivery via Redis Pub/Sub
//! - Persistent progress history via Redis Sorted Sets, for clients that
//!   reconnect mid-stream or poll instead of holding a socket open
//! - Worker heartbeat tracking for stale-job detection
//! - `JobStatusCache` caching for fast `GET /jobs/{id}` polling without a
//!   JobStore round-trip

use chrono::Utc;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use advgen_models::{JobId, JobState, JobStatusCache, ProgressEvent, Stage};

use crate::error::QueueResult;

// ============================================================================
// Redis Key Prefixes and TTLs
// ============================================================================

const HEARTBEAT_KEY_PREFIX: &str = "heartbeat:";
const PROGRESS_HISTORY_PREFIX: &str = "progress:history:";
const JOB_STATUS_PREFIX: &str = "job:status:";
const ACTIVE_JOBS_KEY: &str = "jobs:active";

/// Heartbeat TTL - job considered dead after this duration without heartbeat (seconds)
pub const HEARTBEAT_TTL_SECS: u64 = 60;

/// Progress history TTL - keep progress events for recovery (seconds)
pub const PROGRESS_HISTORY_TTL_SECS: u64 = 3600; // 1 hour

/// Job status cache TTL (seconds)
pub const JOB_STATUS_TTL_SECS: u64 = 86400; // 24 hours

// ============================================================================
// Data Structures
// ============================================================================

/// A `ProgressEvent`, tagged with the ordering/timestamp metadata the
/// transport (rather than the domain event itself) owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEnvelope {
    pub job_id: JobId,
    pub event: ProgressEvent,
    /// Event timestamp (milliseconds since epoch)
    #[serde(default = "default_timestamp")]
    pub timestamp_ms: i64,
    /// Sequence number for ordering
    #[serde(default)]
    pub seq: u64,
}

fn default_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

impl ProgressEnvelope {
    pub fn new(job_id: JobId, event: ProgressEvent) -> Self {
        Self {
            job_id,
            event,
            timestamp_ms: Utc::now().timestamp_millis(),
            seq: 0,
        }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }
}

/// Channel for publishing/subscribing to progress events.
#[derive(Clone)]
pub struct ProgressBus {
    client: redis::Client,
}

impl ProgressBus {
    /// Create a new progress bus.
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Get the channel name for a job.
    pub fn channel_name(job_id: &JobId) -> String {
        format!("progress:{}", job_id)
    }

    /// Publish a progress event (Pub/Sub only, no persistence).
    ///
    /// For most use cases, prefer `publish_with_history` which also persists
    /// the event for recovery purposes.
    pub async fn publish(&self, envelope: &ProgressEnvelope) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(&envelope.job_id);
        let payload = serde_json::to_string(envelope)?;

        debug!("Publishing progress event to {}", channel);
        conn.publish::<_, _, ()>(channel, payload).await?;

        Ok(())
    }

    /// Publish a progress event with persistence to history.
    ///
    /// This performs a dual-write:
    /// 1. Pub/Sub for real-time delivery to connected clients
    /// 2. Sorted set for history/recovery (scored by timestamp)
    pub async fn publish_with_history(&self, envelope: &ProgressEnvelope) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(&envelope.job_id);
        let history_key = format!("{}{}", PROGRESS_HISTORY_PREFIX, envelope.job_id);
        let payload = serde_json::to_string(envelope)?;
        let score = envelope.timestamp_ms as f64;

        debug!("Publishing progress event to {} with history", channel);

        // Dual-write: Pub/Sub + Sorted Set
        redis::pipe()
            .publish(&channel, &payload)
            .ignore()
            .zadd(&history_key, &payload, score)
            .ignore()
            .expire(&history_key, PROGRESS_HISTORY_TTL_SECS as i64)
            .ignore()
            .exec_async(&mut conn)
            .await?;

        Ok(())
    }

    /// Publish a `ProgressEvent` for a job, with history.
    pub async fn emit(&self, job_id: &JobId, event: ProgressEvent) -> QueueResult<()> {
        self.publish_with_history(&ProgressEnvelope::new(job_id.clone(), event))
            .await
    }

    /// Subscribe to progress events for a job.
    /// Returns a pinned stream that can be polled with `.next()`.
    pub async fn subscribe(
        &self,
        job_id: &JobId,
    ) -> QueueResult<std::pin::Pin<Box<dyn futures::Stream<Item = ProgressEnvelope> + Send>>> {
        use futures::StreamExt;

        let mut pubsub = self.client.get_async_pubsub().await?;
        let channel = Self::channel_name(job_id);

        pubsub.subscribe(&channel).await?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = msg.get_payload().ok()?;
            serde_json::from_str(&payload).ok()
        });

        Ok(Box::pin(stream))
    }

    // ========================================================================
    // Heartbeat Methods
    // ========================================================================

    /// Update worker heartbeat for a job.
    ///
    /// Workers should call this every 10 seconds during processing.
    /// The heartbeat key has a 60-second TTL, so missing 6 consecutive
    /// heartbeats will cause the job to be considered stale.
    pub async fn heartbeat(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}{}", HEARTBEAT_KEY_PREFIX, job_id);
        let now = Utc::now().timestamp();

        conn.set_ex::<_, _, ()>(&key, now, HEARTBEAT_TTL_SECS).await?;
        debug!("Updated heartbeat for job {}", job_id);

        Ok(())
    }

    /// Check if a job has an active heartbeat.
    pub async fn is_alive(&self, job_id: &JobId) -> QueueResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}{}", HEARTBEAT_KEY_PREFIX, job_id);

        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    /// Clear heartbeat when job completes.
    pub async fn clear_heartbeat(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}{}", HEARTBEAT_KEY_PREFIX, job_id);

        conn.del::<_, ()>(&key).await?;
        Ok(())
    }

    // ========================================================================
    // Progress History Methods
    // ========================================================================

    /// Get progress history since a given timestamp.
    ///
    /// Returns all progress events with timestamp >= since_ms.
    pub async fn get_history_since(
        &self,
        job_id: &JobId,
        since_ms: i64,
    ) -> QueueResult<Vec<ProgressEnvelope>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}{}", PROGRESS_HISTORY_PREFIX, job_id);

        let events: Vec<String> = conn.zrangebyscore(&key, since_ms as f64, "+inf").await?;

        let parsed: Vec<ProgressEnvelope> = events
            .into_iter()
            .filter_map(|s| serde_json::from_str(&s).ok())
            .collect();

        Ok(parsed)
    }

    /// Get all progress history for a job.
    pub async fn get_full_history(&self, job_id: &JobId) -> QueueResult<Vec<ProgressEnvelope>> {
        self.get_history_since(job_id, 0).await
    }

    /// Clear progress history for a job.
    pub async fn clear_history(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}{}", PROGRESS_HISTORY_PREFIX, job_id);

        conn.del::<_, ()>(&key).await?;
        Ok(())
    }

    // ========================================================================
    // Job Status Cache Methods
    // ========================================================================

    /// Initialize job status cache when a job starts.
    pub async fn init_job_status(
        &self,
        job_id: &JobId,
        owner_id: &str,
        scenes_total: u32,
    ) -> QueueResult<()> {
        let mut status = JobStatusCache::new(job_id.to_string(), owner_id, scenes_total);
        status.set_stage(JobState::Processing, Stage::Admitted);

        self.update_job_status(job_id, &status).await?;
        self.add_to_active_jobs(job_id).await?;

        Ok(())
    }

    /// Update job status cache.
    pub async fn update_job_status(&self, job_id: &JobId, status: &JobStatusCache) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}{}", JOB_STATUS_PREFIX, job_id);
        let payload = serde_json::to_string(status)?;

        conn.set_ex::<_, _, ()>(&key, payload, JOB_STATUS_TTL_SECS).await?;
        Ok(())
    }

    /// Get cached job status.
    pub async fn get_job_status(&self, job_id: &JobId) -> QueueResult<Option<JobStatusCache>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("{}{}", JOB_STATUS_PREFIX, job_id);

        let value: Option<String> = conn.get(&key).await?;
        Ok(value.and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// Advance stage/state in status cache, also emitting the matching
    /// `ProgressEvent::Update` to the bus.
    pub async fn advance_stage(
        &self,
        job_id: &JobId,
        state: JobState,
        stage: Stage,
        scenes_completed: u32,
        scenes_total: u32,
    ) -> QueueResult<()> {
        if let Some(mut status) = self.get_job_status(job_id).await? {
            status.set_stage(state, stage);
            status.set_scenes_completed(scenes_completed);
            self.update_job_status(job_id, &status).await?;
        }
        self.emit(job_id, ProgressEvent::update(stage, scenes_completed, scenes_total))
            .await
    }

    /// Mark job as completed in status cache.
    pub async fn complete_job_status(&self, job_id: &JobId) -> QueueResult<()> {
        if let Some(mut status) = self.get_job_status(job_id).await? {
            status.complete();
            self.update_job_status(job_id, &status).await?;
            self.remove_from_active_jobs(job_id).await?;
            self.clear_heartbeat(job_id).await?;
        }
        Ok(())
    }

    /// Mark job as failed in status cache.
    pub async fn fail_job_status(&self, job_id: &JobId, error: &str) -> QueueResult<()> {
        if let Some(mut status) = self.get_job_status(job_id).await? {
            status.fail(error);
            self.update_job_status(job_id, &status).await?;
            self.remove_from_active_jobs(job_id).await?;
            self.clear_heartbeat(job_id).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Active Jobs Tracking
    // ========================================================================

    /// Add a job to the active jobs set.
    async fn add_to_active_jobs(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let score = Utc::now().timestamp_millis() as f64;

        conn.zadd::<_, _, _, ()>(ACTIVE_JOBS_KEY, job_id.to_string(), score).await?;
        Ok(())
    }

    /// Remove a job from the active jobs set.
    async fn remove_from_active_jobs(&self, job_id: &JobId) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        conn.zrem::<_, _, ()>(ACTIVE_JOBS_KEY, job_id.to_string()).await?;
        Ok(())
    }

    /// Get all active jobs.
    ///
    /// Used by the stale job detector to check for jobs that need recovery.
    pub async fn get_active_jobs(&self) -> QueueResult<Vec<JobStatusCache>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let job_ids: Vec<String> = conn.zrange(ACTIVE_JOBS_KEY, 0, -1).await?;

        let mut statuses = Vec::with_capacity(job_ids.len());
        for job_id in job_ids {
            if let Some(status) = self.get_job_status(&JobId::from_string(job_id)).await? {
                statuses.push(status);
            }
        }

        Ok(statuses)
    }

    /// Clean up stale entries from active jobs set.
    ///
    /// Removes jobs that are no longer in the status cache.
    pub async fn cleanup_active_jobs(&self) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let job_ids: Vec<String> = conn.zrange(ACTIVE_JOBS_KEY, 0, -1).await?;

        let mut removed = 0u32;
        for job_id in job_ids {
            let key = format!("{}{}", JOB_STATUS_PREFIX, job_id);
            let exists: bool = conn.exists(&key).await?;
            if !exists {
                conn.zrem::<_, _, ()>(ACTIVE_JOBS_KEY, &job_id).await?;
                removed += 1;
                warn!("Cleaned up orphaned active job: {}", job_id);
            }
        }

        Ok(removed)
    }
}
