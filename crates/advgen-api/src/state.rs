//! Application state.

use std::sync::Arc;

use advgen_jobstore::{FirestoreClient, JobRepository, SceneRepository};
use advgen_modelclients::SceneVideoClient;
use advgen_queue::{JobQueue, ProgressBus};
use advgen_storage::R2Client;

use crate::admission::AdmissionGate;
use crate::auth::JwksCache;
use crate::config::ApiConfig;

/// Shared application state, handed to every handler via axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<R2Client>,
    pub firestore: Arc<FirestoreClient>,
    pub jobs: JobRepository,
    pub scenes: SceneRepository,
    pub queue: Arc<JobQueue>,
    pub progress: Arc<ProgressBus>,
    pub jwks: Arc<JwksCache>,
    pub admission: AdmissionGate,
    /// Queried at Admission time for the active video adapter's permissible
    /// clip-size family.
    pub scene_video_clip_sizes: &'static [u32],
}

impl AppState {
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = R2Client::from_env().await?;
        let firestore = FirestoreClient::from_env().await?;
        let jobs = JobRepository::new(firestore.clone());
        let scenes = SceneRepository::new(firestore.clone());
        let queue = JobQueue::from_env()?;

        let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let progress = ProgressBus::new(&redis_url)?;

        let jwks = JwksCache::new().await?;
        let scene_video_clip_sizes = SceneVideoClient::from_env()?.clip_sizes();
        let admission = AdmissionGate::new(config.admission_window);

        Ok(Self {
            config,
            storage: Arc::new(storage),
            firestore: Arc::new(firestore),
            jobs,
            scenes,
            queue: Arc::new(queue),
            progress: Arc::new(progress),
            jwks: Arc::new(jwks),
            admission,
            scene_video_clip_sizes,
        })
    }
}
