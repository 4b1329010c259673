//! ModelClients: thin per-provider adapters over the four generative model
//! providers the orchestrator drives.
//!
//! Every adapter exposes the same `Start`/`Poll` contract via the
//! [`ModelClient`] trait; [`poll_until`] gives every call path uniform
//! cancellation and capped-backoff polling.

pub mod client;
pub mod error;
pub mod http;
pub mod music;
pub mod narrator;
pub mod script;
pub mod scene_video;
pub mod types;

pub use client::{poll_until, poll_until_cancelable, with_backoff, ModelClient};
pub use error::{ModelClientError, ModelClientResult};
pub use music::{MusicArtifact, MusicClient, MusicRequest};
pub use narrator::{NarratorArtifact, NarratorClient, NarratorRequest};
pub use script::{ScriptClient, ScriptDraft, ScriptRequest, SceneDraft};
pub use scene_video::{SceneVideoArtifact, SceneVideoClient, SceneVideoRequest, CLIP_SIZES_4_6_8_FAMILY, CLIP_SIZES_5S_FAMILY};
pub use types::{BackoffPolicy, Handle, PollOutcome, PollPolicy};
