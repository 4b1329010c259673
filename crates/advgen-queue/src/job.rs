//! Queue payload types: the two job shapes the orchestrator consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use advgen_models::{AspectRatio, JobId, StyleControls};

/// Job to generate a new ad video end-to-end from a brief.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideoJob {
    pub job_id: JobId,
    pub owner_id: String,
    pub prompt: String,
    pub duration_s: u32,
    pub aspect_ratio: AspectRatio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_controls: Option<StyleControls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_image_asset_key: Option<String>,
    pub voice: String,
    pub created_at: DateTime<Utc>,
}

impl GenerateVideoJob {
    pub fn new(
        owner_id: impl Into<String>,
        job_id: JobId,
        prompt: impl Into<String>,
        duration_s: u32,
        aspect_ratio: AspectRatio,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            owner_id: owner_id.into(),
            prompt: prompt.into(),
            duration_s,
            aspect_ratio,
            style_controls: None,
            side_effects_text: None,
            product_image_asset_key: None,
            voice: voice.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_style_controls(mut self, style_controls: Option<StyleControls>) -> Self {
        self.style_controls = style_controls;
        self
    }

    pub fn with_side_effects_text(mut self, text: Option<String>) -> Self {
        self.side_effects_text = text;
        self
    }

    pub fn with_product_image_asset_key(mut self, key: Option<String>) -> Self {
        self.product_image_asset_key = key;
        self
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!("generate:{}:{}", self.owner_id, self.job_id)
    }
}

/// Job to regenerate a single scene (and, if `cascade`, every downstream
/// scene whose start image depends on it) of an already-composed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerateSceneJob {
    pub job_id: JobId,
    pub owner_id: String,
    /// The already-composed job this regeneration is scoped against.
    pub source_job_id: JobId,
    pub scene_index: u32,
    /// Whether downstream scenes must be re-rendered too (their start image
    /// is this scene's new last frame).
    pub cascade: bool,
    pub created_at: DateTime<Utc>,
}

impl RegenerateSceneJob {
    pub fn new(
        owner_id: impl Into<String>,
        job_id: JobId,
        source_job_id: JobId,
        scene_index: u32,
        cascade: bool,
    ) -> Self {
        Self {
            job_id,
            owner_id: owner_id.into(),
            source_job_id,
            scene_index,
            cascade,
            created_at: Utc::now(),
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        format!(
            "regenerate:{}:{}:{}",
            self.owner_id, self.source_job_id, self.scene_index
        )
    }
}

/// Generic job wrapper for queue storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    GenerateVideo(GenerateVideoJob),
    RegenerateScene(RegenerateSceneJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::GenerateVideo(j) => &j.job_id,
            QueueJob::RegenerateScene(j) => &j.job_id,
        }
    }

    pub fn owner_id(&self) -> &str {
        match self {
            QueueJob::GenerateVideo(j) => &j.owner_id,
            QueueJob::RegenerateScene(j) => &j.owner_id,
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::GenerateVideo(j) => j.idempotency_key(),
            QueueJob::RegenerateScene(j) => j.idempotency_key(),
        }
    }

    pub fn is_regeneration(&self) -> bool {
        matches!(self, QueueJob::RegenerateScene(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_job_generate_video_serde_roundtrip() {
        let job = GenerateVideoJob::new(
            "owner-1",
            JobId::new(),
            "30 second ad for a running shoe",
            30,
            AspectRatio::PORTRAIT,
            "narrator-1",
        );

        let wrapper = QueueJob::GenerateVideo(job.clone());
        let json = serde_json::to_string(&wrapper).expect("serialize QueueJob");
        let decoded: QueueJob = serde_json::from_str(&json).expect("deserialize QueueJob");

        match decoded {
            QueueJob::GenerateVideo(j) => {
                assert_eq!(j.job_id, job.job_id);
                assert_eq!(j.owner_id, job.owner_id);
                assert_eq!(j.prompt, job.prompt);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn regenerate_scene_job_idempotency_key_is_scoped_to_scene() {
        let a = RegenerateSceneJob::new("owner-1", JobId::new(), JobId::from_string("src-1"), 2, false);
        let b = RegenerateSceneJob::new("owner-1", JobId::new(), JobId::from_string("src-1"), 3, false);
        assert_ne!(a.idempotency_key(), b.idempotency_key());
    }
}
