//! Per-scene records produced by the script stage and filled in by the
//! scene-video stage.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the Composer cuts from this scene into the next.
///
/// The Composer's `concat_scenes` only builds crossfade/cut filter graphs
/// today, so every non-`Cut` variant is rendered as a crossfade of its
/// `duration_ms` (see `Transition::duration_ms`) — but the data model
/// carries the full set the script stage can emit, since which transition
/// reads best is a per-scene narrative decision, not a rendering one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// Hard cut, no overlap. Stream-copied when codecs match (no re-encode).
    Cut,
    /// Fade through black of the given duration.
    Fade { duration_ms: u32 },
    /// Crossfade of the given duration between this scene's tail and the
    /// next scene's head.
    CrossFade { duration_ms: u32 },
    /// Wipe transition, incoming scene entering from the left.
    WipeLeft { duration_ms: u32 },
    /// Wipe transition, incoming scene entering from the right.
    WipeRight { duration_ms: u32 },
    /// Zoom into the incoming scene.
    Zoom { duration_ms: u32 },
}

impl Transition {
    pub const DEFAULT_CROSSFADE_MS: u32 = 500;

    pub fn crossfade() -> Self {
        Transition::CrossFade {
            duration_ms: Self::DEFAULT_CROSSFADE_MS,
        }
    }

    /// The boundary's transition duration, or `None` for `Cut` (an
    /// instantaneous splice has no duration to speak of).
    pub fn duration_ms(&self) -> Option<u32> {
        match self {
            Transition::Cut => None,
            Transition::Fade { duration_ms }
            | Transition::CrossFade { duration_ms }
            | Transition::WipeLeft { duration_ms }
            | Transition::WipeRight { duration_ms }
            | Transition::Zoom { duration_ms } => Some(*duration_ms),
        }
    }
}

impl Default for Transition {
    fn default() -> Self {
        Transition::Cut
    }
}

/// Lifecycle of a single scene within the Scenes stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SceneState {
    #[default]
    Pending,
    /// A generation request for this scene has been started with the video
    /// adapter and is being polled.
    Generating,
    /// The adapter returned a clip and it has been persisted to the
    /// AssetStore.
    Ready,
    Failed,
}

impl SceneState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneState::Pending => "pending",
            SceneState::Generating => "generating",
            SceneState::Ready => "ready",
            SceneState::Failed => "failed",
        }
    }
}

impl fmt::Display for SceneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scene of the generated video, as planned by the script stage and
/// progressively filled in by the scene-video stage.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// Zero-based position in the video.
    pub index: u32,

    /// Regeneration version. Bumped each time this specific scene is
    /// regenerated; the asset key is content-addressed on
    /// `(job_id, index, version)` so an in-flight regenerate never clobbers
    /// the clip a composition currently depends on.
    #[serde(default)]
    pub version: u32,

    /// Visual description handed to the scene-video adapter.
    pub visual_prompt: String,

    /// Narration line spoken during this scene (also feeds `AudioSpec`).
    pub narration_line: String,

    pub duration_s: u32,

    pub transition_out: Transition,

    pub state: SceneState,

    /// AssetStore key of this scene's rendered clip, once `Ready`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_asset_key: Option<String>,

    /// AssetStore key of the last frame extracted from this scene's clip.
    /// Published once so the *next* scene's generation can be released from
    /// the scene-parallel semaphore with start-image continuity, without
    /// every scene waiting on every other scene to fully finish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_frame_asset_key: Option<String>,

    /// AssetStore key of the previous scene's last frame, used as this
    /// scene's start image. `None` for scene 0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_image_asset_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl Scene {
    pub fn new(
        index: u32,
        visual_prompt: impl Into<String>,
        narration_line: impl Into<String>,
        duration_s: u32,
    ) -> Self {
        Self {
            index,
            version: 0,
            visual_prompt: visual_prompt.into(),
            narration_line: narration_line.into(),
            duration_s,
            transition_out: Transition::default(),
            state: SceneState::Pending,
            clip_asset_key: None,
            last_frame_asset_key: None,
            start_image_asset_key: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    pub fn start_generating(mut self) -> Self {
        self.state = SceneState::Generating;
        self.updated_at = Utc::now();
        self
    }

    pub fn ready(mut self, clip_asset_key: impl Into<String>, last_frame_asset_key: impl Into<String>) -> Self {
        self.state = SceneState::Ready;
        self.clip_asset_key = Some(clip_asset_key.into());
        self.last_frame_asset_key = Some(last_frame_asset_key.into());
        self.error_message = None;
        self.updated_at = Utc::now();
        self
    }

    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.state = SceneState::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self
    }

    /// Bump the regeneration version and reset render state, keeping the
    /// script-stage content (prompt/narration) intact.
    pub fn regenerate(mut self) -> Self {
        self.version += 1;
        self.state = SceneState::Pending;
        self.clip_asset_key = None;
        self.last_frame_asset_key = None;
        self.error_message = None;
        self.updated_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_lifecycle() {
        let scene = Scene::new(0, "wide shot of a running shoe on pavement", "Meet the new stride.", 5);
        assert_eq!(scene.state, SceneState::Pending);

        let generating = scene.start_generating();
        assert_eq!(generating.state, SceneState::Generating);

        let ready = generating.ready("jobs/j1/scenes/0/v0.mp4", "jobs/j1/scenes/0/v0_last_frame.jpg");
        assert_eq!(ready.state, SceneState::Ready);
        assert!(ready.clip_asset_key.is_some());
    }

    #[test]
    fn test_scene_regenerate_bumps_version_and_clears_assets() {
        let scene = Scene::new(1, "prompt", "line", 5)
            .start_generating()
            .ready("k1", "k2");
        let regen = scene.regenerate();
        assert_eq!(regen.version, 1);
        assert_eq!(regen.state, SceneState::Pending);
        assert!(regen.clip_asset_key.is_none());
    }

    #[test]
    fn test_transition_default_is_cut() {
        assert_eq!(Transition::default(), Transition::Cut);
        assert_eq!(
            Transition::crossfade(),
            Transition::CrossFade { duration_ms: 500 }
        );
    }

    #[test]
    fn test_transition_duration_ms() {
        assert_eq!(Transition::Cut.duration_ms(), None);
        assert_eq!(Transition::Fade { duration_ms: 300 }.duration_ms(), Some(300));
        assert_eq!(Transition::WipeLeft { duration_ms: 400 }.duration_ms(), Some(400));
        assert_eq!(Transition::WipeRight { duration_ms: 400 }.duration_ms(), Some(400));
        assert_eq!(Transition::Zoom { duration_ms: 600 }.duration_ms(), Some(600));
    }
}
