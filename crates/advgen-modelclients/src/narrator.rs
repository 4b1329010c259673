//! Narrator adapter: text -> speech, with a per-segment playback-rate
//! parameter (used to speak the side-effects disclosure at 1.4x speed).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ModelClient;
use crate::error::ModelClientError;
use crate::http::ProviderHttpClient;
use crate::types::{Handle, PollOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct NarratorRequest {
    pub text: String,
    pub voice: String,
    /// Playback-rate multiplier; `1.0` for ordinary narration, `1.4` for the
    /// compliance-mode side-effects segment.
    pub speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NarratorArtifact {
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

pub struct NarratorClient {
    http: ProviderHttpClient,
}

impl NarratorClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { http: ProviderHttpClient::new(base_url, api_key) }
    }

    pub fn from_env() -> Result<Self, ModelClientError> {
        let base_url = std::env::var("NARRATOR_PROVIDER_URL")
            .map_err(|_| ModelClientError::Rejected("NARRATOR_PROVIDER_URL not set".into()))?;
        let api_key = std::env::var("NARRATOR_PROVIDER_API_KEY").unwrap_or_default();
        Ok(Self::new(base_url, api_key))
    }
}

#[async_trait]
impl ModelClient for NarratorClient {
    type Request = NarratorRequest;
    type Artifact = NarratorArtifact;

    fn name(&self) -> &'static str {
        "narrator"
    }

    async fn start(&self, request: Self::Request) -> Result<Handle, ModelClientError> {
        let response: StartResponse = self.http.post_json("/v1/narration/generate", &request).await?;
        Ok(Handle(response.handle))
    }

    async fn poll(&self, handle: &Handle) -> Result<PollOutcome<Self::Artifact>, ModelClientError> {
        let response: PollResponse = self
            .http
            .get_json(&format!("/v1/narration/generate/{}", handle.0))
            .await?;
        Ok(match response {
            PollResponse::Pending => PollOutcome::Pending,
            PollResponse::Ready { audio_url } => PollOutcome::Ready(NarratorArtifact { audio_url }),
            PollResponse::Failed { reason } => PollOutcome::Failed(reason),
        })
    }
}
