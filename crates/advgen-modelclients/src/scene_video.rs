//! Scene Video Generator adapter (image-to-video with start-image
//! conditioning, 4-10s clips).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use advgen_models::AspectRatio;

use crate::client::ModelClient;
use crate::error::ModelClientError;
use crate::http::ProviderHttpClient;
use crate::types::{Handle, PollOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct SceneVideoRequest {
    pub visual_prompt: String,
    pub duration_s: u32,
    pub aspect_ratio: AspectRatio,
    /// Last-frame JPEG of the previous scene (or the operator-supplied
    /// product image for a compliance job's final scene); `None` for the
    /// first scene of a non-compliance job.
    pub start_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneVideoArtifact {
    /// URL the Orchestrator downloads the rendered clip from.
    pub video_url: String,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum PollResponse {
    Pending,
    Ready { video_url: String },
    Failed { reason: String },
}

/// Clip-size families observed across video providers: this adapter's
/// provider renders in fixed 5s increments.
pub const CLIP_SIZES_5S_FAMILY: &[u32] = &[5, 10];
/// The alternative provider family: 4/6/8s increments.
pub const CLIP_SIZES_4_6_8_FAMILY: &[u32] = &[4, 6, 8];

pub struct SceneVideoClient {
    http: ProviderHttpClient,
    clip_sizes: &'static [u32],
}

impl SceneVideoClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, clip_sizes: &'static [u32]) -> Self {
        Self {
            http: ProviderHttpClient::new(base_url, api_key),
            clip_sizes,
        }
    }

    pub fn from_env() -> Result<Self, ModelClientError> {
        let base_url = std::env::var("VIDEO_PROVIDER_URL")
            .map_err(|_| ModelClientError::Rejected("VIDEO_PROVIDER_URL not set".into()))?;
        let api_key = std::env::var("VIDEO_PROVIDER_API_KEY").unwrap_or_default();
        let clip_sizes = match std::env::var("VIDEO_ADAPTER").as_deref() {
            Ok("clip-family-4-6-8") => CLIP_SIZES_4_6_8_FAMILY,
            _ => CLIP_SIZES_5S_FAMILY,
        };
        Ok(Self::new(base_url, api_key, clip_sizes))
    }

    /// The scene durations this adapter's provider can render. Admission
    /// queries this to validate `duration_s` divisibility instead of
    /// hard-coding a single provider's clip-size family.
    pub fn clip_sizes(&self) -> &'static [u32] {
        self.clip_sizes
    }
}

#[async_trait]
impl ModelClient for SceneVideoClient {
    type Request = SceneVideoRequest;
    type Artifact = SceneVideoArtifact;

    fn name(&self) -> &'static str {
        "scene_video"
    }

    async fn start(&self, request: Self::Request) -> Result<Handle, ModelClientError> {
        let response: StartResponse = self.http.post_json("/v1/scenes/generate", &request).await?;
        Ok(Handle(response.handle))
    }

    async fn poll(&self, handle: &Handle) -> Result<PollOutcome<Self::Artifact>, ModelClientError> {
        let response: PollResponse = self
            .http
            .get_json(&format!("/v1/scenes/generate/{}", handle.0))
            .await?;
        Ok(match response {
            PollResponse::Pending => PollOutcome::Pending,
            PollResponse::Ready { video_url } => PollOutcome::Ready(SceneVideoArtifact { video_url }),
            PollResponse::Failed { reason } => PollOutcome::Failed(reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_size_families_are_distinct() {
        assert_ne!(CLIP_SIZES_5S_FAMILY, CLIP_SIZES_4_6_8_FAMILY);
        assert!(CLIP_SIZES_5S_FAMILY.contains(&5));
        assert!(CLIP_SIZES_4_6_8_FAMILY.contains(&8));
    }
}
