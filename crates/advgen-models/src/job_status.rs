//! Fast-polling job-status cache record.
//!
//! Stored in Redis (advgen-queue's `ProgressBus`), separate from the durable
//! `Job` record in the JobStore: the worker writes this on every heartbeat
//! and stage transition so `GET /jobs/{id}` never has to round-trip to the
//! JobStore for a liveness check.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobState, Stage};

/// How long a job may go without a heartbeat before it's considered stale.
pub const STALE_THRESHOLD_SECS: i64 = 90;
/// Grace period after job start before staleness is evaluated at all (covers
/// the window before the first heartbeat has had a chance to land).
pub const STALE_GRACE_PERIOD_SECS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusCache {
    pub job_id: String,
    pub owner_id: String,
    pub state: JobState,
    pub stage: Stage,
    pub scenes_completed: u32,
    pub scenes_total: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Sequence number for event ordering (monotonically increasing),
    /// doubling as the since-cursor for the history polling endpoint.
    #[serde(default)]
    pub event_seq: u64,
}

impl JobStatusCache {
    pub fn new(job_id: impl Into<String>, owner_id: impl Into<String>, scenes_total: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            owner_id: owner_id.into(),
            state: JobState::Pending,
            stage: Stage::Admitted,
            scenes_completed: 0,
            scenes_total,
            error_message: None,
            started_at: now,
            updated_at: now,
            last_heartbeat: None,
            event_seq: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn set_stage(&mut self, state: JobState, stage: Stage) {
        self.state = state;
        self.stage = stage;
        self.updated_at = Utc::now();
        self.event_seq += 1;
    }

    pub fn set_scenes_completed(&mut self, scenes_completed: u32) {
        self.scenes_completed = scenes_completed;
        self.updated_at = Utc::now();
        self.event_seq += 1;
    }

    pub fn record_heartbeat(&mut self) {
        self.last_heartbeat = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        self.state = JobState::Completed;
        self.stage = Stage::Done;
        self.updated_at = Utc::now();
        self.event_seq += 1;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self.event_seq += 1;
    }

    /// Terminal states are never stale. Otherwise a missing heartbeat is
    /// judged against `grace_period_secs` since job start, and a present one
    /// against `stale_threshold_secs` since the last beat.
    pub fn is_stale(&self, stale_threshold_secs: i64, grace_period_secs: i64) -> bool {
        if self.is_terminal() {
            return false;
        }

        let now = Utc::now();
        match self.last_heartbeat {
            Some(hb) => (now - hb).num_seconds() > stale_threshold_secs,
            None => (now - self.started_at).num_seconds() > grace_period_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_cache_creation() {
        let cache = JobStatusCache::new("job-1", "owner-1", 4);
        assert_eq!(cache.state, JobState::Pending);
        assert_eq!(cache.scenes_total, 4);
        assert!(!cache.is_terminal());
    }

    #[test]
    fn test_job_status_transitions() {
        let mut cache = JobStatusCache::new("job-1", "owner-1", 4);

        cache.set_stage(JobState::Processing, Stage::Scenes);
        assert_eq!(cache.stage, Stage::Scenes);
        assert!(!cache.is_terminal());

        cache.set_scenes_completed(2);
        assert_eq!(cache.scenes_completed, 2);

        cache.complete();
        assert_eq!(cache.state, JobState::Completed);
        assert!(cache.is_terminal());
    }

    #[test]
    fn test_job_status_stale_detection() {
        let mut cache = JobStatusCache::new("job-1", "owner-1", 4);
        cache.set_stage(JobState::Processing, Stage::Script);

        assert!(!cache.is_stale(60, 120));

        cache.started_at = Utc::now() - chrono::Duration::seconds(200);
        assert!(cache.is_stale(60, 120));

        cache.record_heartbeat();
        assert!(!cache.is_stale(60, 120));
    }
}
