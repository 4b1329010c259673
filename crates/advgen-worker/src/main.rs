//! Orchestrator worker binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use advgen_jobstore::{FirestoreClient, JobRepository, SceneRepository};
use advgen_modelclients::{MusicClient, NarratorClient, ScriptClient, SceneVideoClient};
use advgen_queue::{JobQueue, ProgressBus};
use advgen_storage::R2Client;
use advgen_worker::{JobExecutor, Orchestrator, WorkerConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("advgen=info".parse().unwrap()))
        .init();

    info!("starting advgen-worker");

    let config = WorkerConfig::from_env();
    info!(?config, "worker config loaded");

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!(error = %e, "failed to create job queue");
            std::process::exit(1);
        }
    };

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let progress = match ProgressBus::new(&redis_url) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "failed to create progress bus");
            std::process::exit(1);
        }
    };

    let firestore = match FirestoreClient::from_env().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to create firestore client");
            std::process::exit(1);
        }
    };
    let jobs = JobRepository::new(firestore.clone());
    let scenes = SceneRepository::new(firestore);

    let assets = match R2Client::from_env().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to create asset store client");
            std::process::exit(1);
        }
    };

    let script_client = match ScriptClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to create script client");
            std::process::exit(1);
        }
    };
    let scene_video_client = match SceneVideoClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to create scene video client");
            std::process::exit(1);
        }
    };
    let music_client = match MusicClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to create music client");
            std::process::exit(1);
        }
    };
    let narrator_client = match NarratorClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to create narrator client");
            std::process::exit(1);
        }
    };

    let orchestrator = Orchestrator::new(
        config.clone(),
        jobs.clone(),
        scenes,
        assets,
        script_client,
        scene_video_client,
        music_client,
        narrator_client,
        progress,
    );

    let executor = JobExecutor::new(config, queue, jobs, orchestrator);

    let shutdown_handle = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
    });

    if let Err(e) = executor.run().await {
        error!(error = %e, "executor error");
        std::process::exit(1);
    }

    shutdown_handle.await.ok();
    info!("worker shutdown complete");
}
