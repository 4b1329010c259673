//! Music Generator adapter: prompt -> background audio track of a target
//! duration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ModelClient;
use crate::error::ModelClientError;
use crate::http::ProviderHttpClient;
use crate::types::{Handle, PollOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct MusicRequest {
    pub mood: String,
    pub style: String,
    pub duration_s: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MusicArtifact {
    pub audio_url: String,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum PollResponse {
    Pending,
    Ready { audio_url: String },
    Failed { reason: String },
}

pub struct MusicClient {
    http: ProviderHttpClient,
}

impl MusicClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { http: ProviderHttpClient::new(base_url, api_key) }
    }

    pub fn from_env() -> Result<Self, ModelClientError> {
        let base_url = std::env::var("MUSIC_PROVIDER_URL")
            .map_err(|_| ModelClientError::Rejected("MUSIC_PROVIDER_URL not set".into()))?;
        let api_key = std::env::var("MUSIC_PROVIDER_API_KEY").unwrap_or_default();
        Ok(Self::new(base_url, api_key))
    }
}

#[async_trait]
impl ModelClient for MusicClient {
    type Request = MusicRequest;
    type Artifact = MusicArtifact;

    fn name(&self) -> &'static str {
        "music"
    }

    async fn start(&self, request: Self::Request) -> Result<Handle, ModelClientError> {
        let response: StartResponse = self.http.post_json("/v1/music/generate", &request).await?;
        Ok(Handle(response.handle))
    }

    async fn poll(&self, handle: &Handle) -> Result<PollOutcome<Self::Artifact>, ModelClientError> {
        let response: PollResponse = self
            .http
            .get_json(&format!("/v1/music/generate/{}", handle.0))
            .await?;
        Ok(match response {
            PollResponse::Pending => PollOutcome::Pending,
            PollResponse::Ready { audio_url } => PollOutcome::Ready(MusicArtifact { audio_url }),
            PollResponse::Failed { reason } => PollOutcome::Failed(reason),
        })
    }
}
