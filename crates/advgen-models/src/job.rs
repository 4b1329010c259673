//! The `Job` record: the durable, single source of truth for one ad-video
//! generation run, and everything the orchestrator needs to resume it after
//! a crash.

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::audio::AudioSpec;
use crate::style::{AspectRatio, StyleControls};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal/non-terminal lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Queued, not yet claimed by a worker.
    #[default]
    Pending,
    /// Claimed by a worker and actively moving through pipeline stages.
    Processing,
    /// Composition finished and the rendered asset is available.
    Completed,
    /// A stage failed; may still be retried.
    Failed,
    /// Exhausted its retry budget; moved to the dead-letter queue.
    DeadLettered,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::DeadLettered => "dead_lettered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::DeadLettered)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which pipeline stage a `Processing` job is currently in.
///
/// Distinct from `JobState`: a job can be `Processing` while in any of
/// these, and `Failed`/`DeadLettered` jobs retain the stage they failed in
/// so the orchestrator knows where to resume a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Not yet started.
    #[default]
    Admitted,
    /// Script stage: expanding the brief into per-scene scripts + `AudioSpec`.
    Script,
    /// Scene stage: parallel scene-video generation with pipelined
    /// start-image continuity across scenes.
    Scenes,
    /// Audio stage: narration/music/side-effects synthesis.
    Audio,
    /// Composition stage: concat, mix, transcode to the delivery container.
    Composition,
    /// All stages finished.
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Admitted => "admitted",
            Stage::Script => "script",
            Stage::Scenes => "scenes",
            Stage::Audio => "audio",
            Stage::Composition => "composition",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A job type distinguishes a fresh generation run from a scoped
/// scene-regeneration run against an existing job's assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Generate a new video end-to-end from a brief.
    GenerateVideo,
    /// Regenerate a single scene (and any downstream scenes whose start
    /// image depends on it) of an existing, already-composed job.
    RegenerateScene,
}

/// A worker's exclusive claim on a job, guarding regenerate/delete requests
/// from racing an in-flight worker. See `Job::acquire_lease`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkerLease {
    pub worker_id: String,
    pub expires_at: DateTime<Utc>,
}

impl WorkerLease {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// The durable job record. One row per generation (or regeneration) request,
/// persisted in the JobStore and mutated only by the worker that holds its
/// lease (or by Admission at creation time).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,

    /// Owning account. Used for ownership checks on every read/write route.
    pub owner_id: String,

    pub state: JobState,
    pub stage: Stage,

    /// Natural-language ad brief.
    pub prompt: String,

    /// Target total duration of the rendered video, in seconds.
    pub duration_s: u32,

    pub aspect_ratio: AspectRatio,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_controls: Option<StyleControls>,

    /// Free-text description of a sound-effect cue to place in the mix.
    /// Input only — the script stage derives `AudioSpec::side_effects_start_time_s`
    /// from it; this field is never mutated after admission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects_text: Option<String>,

    /// Operator-supplied product image, uploaded via the presigned-upload
    /// route ahead of submission. Required input when `side_effects_text`
    /// is set (compliance mode); the script stage pins the final scene's
    /// `start_image_asset_key` to it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_image_asset_key: Option<String>,

    /// Narrator voice identifier, passed through to the Narrator adapter.
    pub voice: String,

    /// Current version per scene index, 1-based (`1` for a scene's first
    /// render, `2` after its first regeneration, and so on) so asset keys
    /// stay content-addressed without clobbering the previous version while
    /// a regenerate is in flight. Populated by `Job::set_scene_version` as
    /// each scene reaches `Ready`; see `Scene::version` for the underlying
    /// 0-based render counter this is derived from.
    #[serde(default)]
    pub scene_versions: Vec<u32>,

    /// Composition version counter, bumped whenever any scene regeneration
    /// forces the final render to be recomposed.
    #[serde(default)]
    pub clip_version: u32,

    pub scenes_total: u32,
    #[serde(default)]
    pub scenes_completed: u32,

    /// Produced by the script stage; `None` until `Stage::Script` completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_spec: Option<AudioSpec>,

    /// Script title, for display purposes only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// AssetStore key of the primary delivery artifact, set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mp4_asset_key: Option<String>,
    /// AssetStore key of the WebM delivery alternative; best-effort, may be
    /// absent even on a completed job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webm_asset_key: Option<String>,
    /// Thumbnail image, derived from the first scene's last frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_asset_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<WorkerLease>,

    /// Time-to-live for the rendered asset and job record; rows past this
    /// are eligible for garbage collection.
    pub ttl: DateTime<Utc>,

    /// `{owner_id}:{prompt-hash-or-client-supplied-key}` — dedups duplicate
    /// submissions of the same brief within the idempotency window.
    pub idempotency_key: String,
}

fn default_max_retries() -> u32 {
    3
}

const DEFAULT_JOB_TTL_DAYS: i64 = 7;
/// How long an acquired worker lease stays valid before a crash-recovery
/// sweep is allowed to reclaim the job.
pub const LEASE_DURATION_SECS: i64 = 120;

impl Job {
    /// Create a new end-to-end generation job.
    pub fn new_generate_video(
        owner_id: impl Into<String>,
        prompt: impl Into<String>,
        duration_s: u32,
        aspect_ratio: AspectRatio,
        voice: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        let owner_id = owner_id.into();
        let now = Utc::now();

        Self {
            id: JobId::new(),
            job_type: JobType::GenerateVideo,
            owner_id,
            state: JobState::Pending,
            stage: Stage::Admitted,
            prompt: prompt.into(),
            duration_s,
            aspect_ratio,
            style_controls: None,
            side_effects_text: None,
            product_image_asset_key: None,
            voice: voice.into(),
            scene_versions: Vec::new(),
            clip_version: 0,
            scenes_total: 0,
            scenes_completed: 0,
            audio_spec: None,
            title: None,
            mp4_asset_key: None,
            webm_asset_key: None,
            thumbnail_asset_key: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: default_max_retries(),
            lease: None,
            ttl: now + Duration::days(DEFAULT_JOB_TTL_DAYS),
            idempotency_key: idempotency_key.into(),
        }
    }

    pub fn start(mut self) -> Self {
        self.state = JobState::Processing;
        self.started_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    pub fn advance_to(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self.updated_at = Utc::now();
        self
    }

    /// Record the composed artifact keys ahead of `complete()`.
    pub fn with_final_assets(mut self, mp4_asset_key: impl Into<String>, webm_asset_key: Option<String>, thumbnail_asset_key: Option<String>) -> Self {
        self.mp4_asset_key = Some(mp4_asset_key.into());
        self.webm_asset_key = webm_asset_key;
        self.thumbnail_asset_key = thumbnail_asset_key;
        self.updated_at = Utc::now();
        self
    }

    pub fn complete(mut self) -> Self {
        self.state = JobState::Completed;
        self.stage = Stage::Done;
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self.lease = None;
        self
    }

    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.state = JobState::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self.retry_count += 1;
        self.lease = None;
        self
    }

    pub fn dead_letter(mut self) -> Self {
        self.state = JobState::DeadLettered;
        self.updated_at = Utc::now();
        self.lease = None;
        self
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries && self.state == JobState::Failed
    }

    pub fn scene_completed(mut self) -> Self {
        self.scenes_completed += 1;
        self.updated_at = Utc::now();
        self
    }

    /// Record that scene `index` just reached `Ready` at its own 0-based
    /// `Scene::version` counter, translating it into the 1-based version
    /// exposed on `scene_versions` (`1` for a scene's first render).
    pub fn set_scene_version(&mut self, index: u32, scene_version: u32) {
        let index = index as usize;
        if self.scene_versions.len() <= index {
            self.scene_versions.resize(index + 1, 0);
        }
        self.scene_versions[index] = scene_version + 1;
        self.updated_at = Utc::now();
    }

    /// Acquire the worker lease, rejecting the call if a still-active lease
    /// is already held by a different worker.
    pub fn acquire_lease(&mut self, worker_id: impl Into<String>) -> Result<(), LeaseConflict> {
        let now = Utc::now();
        let worker_id = worker_id.into();
        if let Some(existing) = &self.lease {
            if existing.is_active(now) && existing.worker_id != worker_id {
                return Err(LeaseConflict {
                    held_by: existing.worker_id.clone(),
                });
            }
        }
        self.lease = Some(WorkerLease {
            worker_id,
            expires_at: now + Duration::seconds(LEASE_DURATION_SECS),
        });
        self.updated_at = now;
        Ok(())
    }

    pub fn renew_lease(&mut self, worker_id: &str) -> Result<(), LeaseConflict> {
        let now = Utc::now();
        match &self.lease {
            Some(existing) if existing.worker_id == worker_id => {
                self.lease = Some(WorkerLease {
                    worker_id: worker_id.to_string(),
                    expires_at: now + Duration::seconds(LEASE_DURATION_SECS),
                });
                Ok(())
            }
            Some(existing) => Err(LeaseConflict {
                held_by: existing.worker_id.clone(),
            }),
            None => Err(LeaseConflict {
                held_by: String::new(),
            }),
        }
    }

    pub fn release_lease(&mut self) {
        self.lease = None;
        self.updated_at = Utc::now();
    }

    /// Whether a regenerate/delete request against this job would race an
    /// in-flight worker.
    pub fn has_active_lease(&self) -> bool {
        self.lease
            .as_ref()
            .is_some_and(|l| l.is_active(Utc::now()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("job lease held by worker {held_by}")]
pub struct LeaseConflict {
    pub held_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio() -> AspectRatio {
        AspectRatio::PORTRAIT
    }

    #[test]
    fn test_job_creation() {
        let job = Job::new_generate_video(
            "owner-1",
            "30 second ad for a running shoe",
            30,
            ratio(),
            "narrator-1",
            "owner-1:abc123",
        );

        assert_eq!(job.job_type, JobType::GenerateVideo);
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.stage, Stage::Admitted);
        assert!(job.idempotency_key.starts_with("owner-1:"));
    }

    #[test]
    fn test_job_state_transitions() {
        let job = Job::new_generate_video("owner-1", "brief", 15, ratio(), "v1", "k1");

        let started = job.start().advance_to(Stage::Script);
        assert_eq!(started.state, JobState::Processing);
        assert_eq!(started.stage, Stage::Script);
        assert!(started.started_at.is_some());

        let completed = started.complete();
        assert_eq!(completed.state, JobState::Completed);
        assert_eq!(completed.stage, Stage::Done);
    }

    #[test]
    fn test_job_retry() {
        let job = Job::new_generate_video("owner-1", "brief", 15, ratio(), "v1", "k1");
        let failed = job.fail("scene adapter timed out");
        assert!(failed.can_retry());
        assert_eq!(failed.retry_count, 1);
    }

    #[test]
    fn test_lease_conflict() {
        let mut job = Job::new_generate_video("owner-1", "brief", 15, ratio(), "v1", "k1");
        job.acquire_lease("worker-a").unwrap();
        assert!(job.has_active_lease());

        let err = job.acquire_lease("worker-b").unwrap_err();
        assert_eq!(err.held_by, "worker-a");

        job.renew_lease("worker-a").unwrap();
        job.release_lease();
        assert!(!job.has_active_lease());
    }

    #[test]
    fn test_set_scene_version_is_one_based_and_sparse_safe() {
        let mut job = Job::new_generate_video("owner-1", "brief", 15, ratio(), "v1", "k1");

        job.set_scene_version(2, 0);
        assert_eq!(job.scene_versions, vec![0, 0, 1]);

        job.set_scene_version(0, 0);
        assert_eq!(job.scene_versions, vec![1, 0, 1]);

        job.set_scene_version(2, 1);
        assert_eq!(job.scene_versions, vec![1, 0, 2]);
    }
}
