//! Shared wire/domain types for the ad-video generation orchestrator.
//!
//! - Job lifecycle: jobs, pipeline stages, worker leases (`job`)
//! - Per-scene records (`scene`)
//! - The audio track specification (`audio`)
//! - Output aspect ratio + style controls (`style`)
//! - Output encoding configuration (`encoding`)
//! - ProgressStream event envelopes (`progress`)
//! - The fast-polling job-status cache record (`job_status`)
//! - Timestamp parsing/validation (`timestamp`)

pub mod audio;
pub mod encoding;
pub mod job;
pub mod job_status;
pub mod progress;
pub mod scene;
pub mod style;
pub mod timestamp;

pub use audio::{
    AudioSpec, SyncPoint, Voice, VoiceError, MUSIC_MIX_LEVEL, NORMAL_NARRATOR_SPEED,
    SIDE_EFFECTS_NARRATOR_SPEED, SIDE_EFFECTS_TIMELINE_FRACTION,
};
pub use encoding::EncodingConfig;
pub use job::{Job, JobId, JobState, JobType, LeaseConflict, Stage, WorkerLease, LEASE_DURATION_SECS};
pub use job_status::{JobStatusCache, STALE_GRACE_PERIOD_SECS, STALE_THRESHOLD_SECS};
pub use progress::{ProgressEvent, ProgressEventKind};
pub use scene::{Scene, SceneState, Transition};
pub use style::{AspectRatio, StyleControls, StyleControlsError};
