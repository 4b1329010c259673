//! Script Generator adapter (LLM): expands a brief into a deterministic
//! scene breakdown plus the seed narration/music prompts for the audio
//! stage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use std::collections::HashMap;

use advgen_models::Transition;

use crate::client::ModelClient;
use crate::error::ModelClientError;
use crate::http::ProviderHttpClient;
use crate::types::{Handle, PollOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct ScriptRequest {
    pub prompt: String,
    pub duration_s: u32,
    pub style_controls: Option<String>,
    /// Permissible scene durations for the selected scene-video provider
    /// — the LLM is asked to only emit
    /// scenes whose durations are drawn from this set.
    pub allowed_clip_sizes: Vec<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneDraft {
    pub visual_prompt: String,
    pub narration_line: String,
    pub duration_s: u32,
    #[serde(default)]
    pub transition_out: Transition,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptDraft {
    pub title: String,
    pub scenes: Vec<SceneDraft>,
    pub music_prompt: String,
}

impl ScriptDraft {
    pub fn narration_script(&self) -> String {
        self.scenes
            .iter()
            .map(|s| s.narration_line.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn total_duration_s(&self) -> u32 {
        self.scenes.iter().map(|s| s.duration_s).sum()
    }
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum PollResponse {
    Pending,
    Ready { script: ScriptDraft },
    Failed { reason: String },
}

/// LLM providers answer synchronously; `start` performs the whole request
/// and stashes the decoded result under the returned handle so `poll`
/// mirrors the uniform `Start`/`Poll` contract every other adapter uses
///.
pub struct ScriptClient {
    http: ProviderHttpClient,
    completed: Mutex<HashMap<String, PollResponse>>,
}

impl ScriptClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: ProviderHttpClient::new(base_url, api_key),
            completed: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_env() -> Result<Self, ModelClientError> {
        let base_url = std::env::var("SCRIPT_PROVIDER_URL")
            .map_err(|_| ModelClientError::Rejected("SCRIPT_PROVIDER_URL not set".into()))?;
        let api_key = std::env::var("SCRIPT_PROVIDER_API_KEY").unwrap_or_default();
        Ok(Self::new(base_url, api_key))
    }
}

#[async_trait]
impl ModelClient for ScriptClient {
    type Request = ScriptRequest;
    type Artifact = ScriptDraft;

    fn name(&self) -> &'static str {
        "script"
    }

    async fn start(&self, request: Self::Request) -> Result<Handle, ModelClientError> {
        let response: PollResponse = self.http.post_json("/v1/scripts/generate", &request).await?;
        let handle = Handle::new();
        self.completed.lock().await.insert(handle.0.clone(), response);
        Ok(handle)
    }

    async fn poll(&self, handle: &Handle) -> Result<PollOutcome<Self::Artifact>, ModelClientError> {
        let mut completed = self.completed.lock().await;
        match completed.remove(&handle.0) {
            Some(PollResponse::Ready { script }) => Ok(PollOutcome::Ready(script)),
            Some(PollResponse::Failed { reason }) => Ok(PollOutcome::Failed(reason)),
            Some(PollResponse::Pending) | None => Ok(PollOutcome::Pending),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_draft_narration_concatenation() {
        let draft = ScriptDraft {
            title: "Stride".into(),
            scenes: vec![
                SceneDraft {
                    visual_prompt: "wide shot".into(),
                    narration_line: "Meet the new stride.".into(),
                    duration_s: 5,
                    transition_out: Transition::default(),
                },
                SceneDraft {
                    visual_prompt: "close up".into(),
                    narration_line: "Built for every step.".into(),
                    duration_s: 5,
                    transition_out: Transition::default(),
                },
            ],
            music_prompt: "upbeat synth".into(),
        };
        assert_eq!(draft.narration_script(), "Meet the new stride. Built for every step.");
        assert_eq!(draft.total_duration_s(), 10);
    }
}
