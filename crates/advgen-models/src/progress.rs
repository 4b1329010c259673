//! ProgressStream envelope types, delivered over the WebSocket channel and
//! mirrored into the durable progress history used by the polling fallback.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::Stage;

/// Discriminant used by `ProgressEvent::kind()` for metrics/logging without
/// matching on the full enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventKind {
    Update,
    SceneReady,
    Error,
    Done,
}

/// A single event on a job's ProgressStream.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Coarse-grained stage/progress update, emitted on every stage
    /// transition and at least once per completed scene.
    Update {
        stage: Stage,
        scenes_completed: u32,
        scenes_total: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A single scene finished rendering and its clip is available.
    SceneReady {
        scene_index: u32,
        clip_asset_key: String,
        timestamp: DateTime<Utc>,
    },

    /// A stage failed. Terminal only if the job itself is about to
    /// transition to `Failed`/`DeadLettered` — a retried stage emits this
    /// and then resumes with further `Update` events.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Composition finished; the rendered asset is ready for delivery. The
    /// stream closes after this event.
    Done {
        asset_key: String,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn update(stage: Stage, scenes_completed: u32, scenes_total: u32) -> Self {
        ProgressEvent::Update {
            stage,
            scenes_completed,
            scenes_total,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn update_with_message(
        stage: Stage,
        scenes_completed: u32,
        scenes_total: u32,
        message: impl Into<String>,
    ) -> Self {
        ProgressEvent::Update {
            stage,
            scenes_completed,
            scenes_total,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn scene_ready(scene_index: u32, clip_asset_key: impl Into<String>) -> Self {
        ProgressEvent::SceneReady {
            scene_index,
            clip_asset_key: clip_asset_key.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
            details: Some(details.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn done(asset_key: impl Into<String>) -> Self {
        ProgressEvent::Done {
            asset_key: asset_key.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> ProgressEventKind {
        match self {
            ProgressEvent::Update { .. } => ProgressEventKind::Update,
            ProgressEvent::SceneReady { .. } => ProgressEventKind::SceneReady,
            ProgressEvent::Error { .. } => ProgressEventKind::Error,
            ProgressEvent::Done { .. } => ProgressEventKind::Done,
        }
    }

    /// Whether receiving this event means the stream is about to close.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Done { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_serialization_tag() {
        let event = ProgressEvent::update(Stage::Scenes, 2, 5);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"update\""));
        assert!(json.contains("\"stage\":\"scenes\""));
    }

    #[test]
    fn test_done_is_terminal() {
        let event = ProgressEvent::done("jobs/j1/final.mp4");
        assert!(event.is_terminal());
        assert!(!ProgressEvent::update(Stage::Audio, 5, 5).is_terminal());
    }
}
