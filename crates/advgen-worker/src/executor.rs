//! Job executor: claims `QueueJob`s from the Redis stream and drives each
//! through the `Orchestrator`, with lease heartbeating, a whole-job
//! deadline, and the retry/DLQ contract.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use advgen_jobstore::JobRepository;
use advgen_models::{Job, JobId, JobState};
use advgen_queue::{JobQueue, QueueJob};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::orchestrator::Orchestrator;

/// Claims and drives jobs from the queue, one tokio task per in-flight job
/// bounded by `config.max_concurrent_jobs`.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    jobs: JobRepository,
    orchestrator: Arc<Orchestrator>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: JobQueue, jobs: JobRepository, orchestrator: Orchestrator) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            jobs,
            orchestrator: Arc::new(orchestrator),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Run the consume loop and the crash-recovery claim loop until shutdown
    /// is signalled, then drain in-flight jobs up to `shutdown_timeout`.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            consumer = %self.consumer_name,
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "starting job executor"
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut shutdown_rx_claim = self.shutdown.subscribe();

        let claim_task = {
            let queue = Arc::clone(&self.queue);
            let jobs = self.jobs.clone();
            let orchestrator = Arc::clone(&self.orchestrator);
            let semaphore = Arc::clone(&self.job_semaphore);
            let consumer_name = self.consumer_name.clone();
            let claim_interval = self.config.claim_interval;
            let claim_min_idle = self.config.claim_min_idle;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(claim_interval);
                loop {
                    tokio::select! {
                        _ = shutdown_rx_claim.changed() => {
                            if *shutdown_rx_claim.borrow() {
                                break;
                            }
                        }
                        _ = interval.tick() => {
                            let claimed = queue
                                .claim_pending(&consumer_name, claim_min_idle.as_millis() as u64, 5)
                                .await;
                            match claimed {
                                Ok(claimed) if !claimed.is_empty() => {
                                    info!("reclaimed {} stalled jobs", claimed.len());
                                    for (message_id, job) in claimed {
                                        let permit = match Arc::clone(&semaphore).acquire_owned().await {
                                            Ok(permit) => permit,
                                            Err(_) => break,
                                        };
                                        let queue = Arc::clone(&queue);
                                        let jobs = jobs.clone();
                                        let orchestrator = Arc::clone(&orchestrator);
                                        let consumer_name = consumer_name.clone();
                                        tokio::spawn(async move {
                                            let _permit = permit;
                                            Self::execute(orchestrator, jobs, queue, consumer_name, message_id, job).await;
                                        });
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => warn!(error = %e, "claim_pending failed"),
                            }
                        }
                    }
                }
            })
        };

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("shutdown signal received, stopping consume loop");
                        break;
                    }
                }
                result = self.consume_and_dispatch() => {
                    if let Err(e) = result {
                        error!(error = %e, "error consuming jobs, backing off");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("waiting for in-flight jobs to drain");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_drain()).await;
        info!("job executor stopped");
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn consume_and_dispatch(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let claimed = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if claimed.is_empty() {
            return Ok(());
        }

        debug!("consumed {} jobs", claimed.len());

        for (message_id, job) in claimed {
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::internal("job semaphore closed"))?;

            let queue = Arc::clone(&self.queue);
            let jobs = self.jobs.clone();
            let orchestrator = Arc::clone(&self.orchestrator);
            let consumer_name = self.consumer_name.clone();

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute(orchestrator, jobs, queue, consumer_name, message_id, job).await;
            });
        }

        Ok(())
    }

    async fn wait_for_drain(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Drive one queue entry through the orchestrator, handling lease
    /// acquisition, heartbeating, and the retry/DLQ decision on failure.
    async fn execute(
        orchestrator: Arc<Orchestrator>,
        jobs: JobRepository,
        queue: Arc<JobQueue>,
        consumer_name: String,
        message_id: String,
        queue_job: QueueJob,
    ) {
        let job_id = queue_job.job_id().to_string();
        info!(job_id = %job_id, "executing job");

        let outcome = Self::run_one(&orchestrator, &jobs, &consumer_name, &queue_job).await;

        match outcome {
            Ok(()) => {
                info!(job_id = %job_id, "job completed");
                if let Err(e) = queue.ack(&message_id).await {
                    error!(job_id = %job_id, error = %e, "failed to ack job");
                }
                if let Err(e) = queue.clear_dedup(&queue_job).await {
                    warn!(job_id = %job_id, error = %e, "failed to clear dedup key");
                }
            }
            Err(e) if e.is_lease_conflict() => {
                // Another worker already holds this job; drop it without
                // counting against the retry budget.
                debug!(job_id = %job_id, "skipping job held by another worker's lease");
                let _ = queue.ack(&message_id).await;
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "job failed");
                let retry_count = queue.increment_retry(&message_id).await.unwrap_or(u32::MAX);
                let max_retries = queue.max_retries();

                if retry_count >= max_retries {
                    warn!(job_id = %job_id, retry_count, max_retries, "moving job to dead-letter queue");
                    if let Err(dlq_err) = queue.dlq(&message_id, &queue_job, &e.to_string()).await {
                        error!(job_id = %job_id, error = %dlq_err, "failed to move job to DLQ");
                    }
                    if let Err(e) = queue.clear_dedup(&queue_job).await {
                        warn!(job_id = %job_id, error = %e, "failed to clear dedup key");
                    }
                    Self::mark_dead_lettered(&jobs, &queue_job, &e.to_string()).await;
                } else {
                    info!(job_id = %job_id, retry_count, max_retries, "job will be retried");
                }
            }
        }
    }

    async fn run_one(
        orchestrator: &Orchestrator,
        jobs: &JobRepository,
        consumer_name: &str,
        queue_job: &QueueJob,
    ) -> WorkerResult<()> {
        match queue_job {
            QueueJob::GenerateVideo(q) => {
                let job = jobs
                    .get(&q.owner_id, &q.job_id)
                    .await?
                    .ok_or_else(|| WorkerError::internal(format!("job {} not found in job store", q.job_id)))?;
                Self::run_with_lease(orchestrator, jobs, consumer_name, job).await
            }
            QueueJob::RegenerateScene(q) => {
                let job = jobs
                    .get(&q.owner_id, &q.source_job_id)
                    .await?
                    .ok_or_else(|| WorkerError::internal(format!("job {} not found in job store", q.source_job_id)))?;
                Self::run_regenerate_with_lease(orchestrator, jobs, consumer_name, job, q.scene_index, q.cascade).await
            }
        }
    }

    async fn run_with_lease(
        orchestrator: &Orchestrator,
        jobs: &JobRepository,
        consumer_name: &str,
        mut job: Job,
    ) -> WorkerResult<()> {
        job.acquire_lease(consumer_name).map_err(|e| WorkerError::lease_conflict(e.to_string()))?;
        if job.state == JobState::Pending {
            job = job.start();
        }
        job = jobs.update(&job, None).await?;

        let owner_id = job.owner_id.clone();
        let job_id = job.id.clone();
        let cancel = CancellationToken::new();
        let heartbeat = Self::spawn_heartbeat(jobs.clone(), job.clone(), consumer_name.to_string(), cancel.clone());

        let result = tokio::time::timeout(Duration::from_secs(3600), orchestrator.run_generate(job, &cancel)).await;
        cancel.cancel();
        heartbeat.abort();

        match result {
            Ok(Ok(mut finished)) => {
                finished.release_lease();
                jobs.update(&finished, None).await?;
                Ok(())
            }
            Ok(Err(e)) => {
                Self::fail_job(jobs, &owner_id, &job_id, &e).await;
                Err(e)
            }
            Err(_) => {
                let timeout_err = WorkerError::timeout("job exceeded its whole-job deadline");
                Self::fail_job(jobs, &owner_id, &job_id, &timeout_err).await;
                Err(timeout_err)
            }
        }
    }

    async fn run_regenerate_with_lease(
        orchestrator: &Orchestrator,
        jobs: &JobRepository,
        consumer_name: &str,
        mut job: Job,
        scene_index: u32,
        cascade: bool,
    ) -> WorkerResult<()> {
        job.acquire_lease(consumer_name).map_err(|e| WorkerError::lease_conflict(e.to_string()))?;
        job = jobs.update(&job, None).await?;

        let owner_id = job.owner_id.clone();
        let source_job_id = job.id.clone();
        let cancel = CancellationToken::new();
        let heartbeat = Self::spawn_heartbeat(jobs.clone(), job.clone(), consumer_name.to_string(), cancel.clone());

        let result = tokio::time::timeout(
            Duration::from_secs(3600),
            orchestrator.run_regenerate(&mut job, &owner_id, &source_job_id, scene_index, cascade, &cancel),
        )
        .await;
        cancel.cancel();
        heartbeat.abort();

        match result {
            // A cascade that stopped partway through still leaves the
            // source job `completed`, recomposed from whatever did
            // regenerate — this is not a job failure, so the lease is
            // simply released and the partial result logged, never
            // `fail_job`'d (that would wipe an already-completed job).
            Ok(Ok(outcome)) => {
                if let Some(scene) = outcome.failed_scene {
                    warn!(
                        job_id = %source_job_id,
                        scenes_regenerated = outcome.scenes_regenerated,
                        failed_scene = scene,
                        error = outcome.error.as_deref().unwrap_or(""),
                        "cascade regeneration stopped early"
                    );
                } else {
                    info!(job_id = %source_job_id, scenes_regenerated = outcome.scenes_regenerated, "scene regeneration complete");
                }
                job.release_lease();
                jobs.update(&job, None).await?;
                Ok(())
            }
            // Errors propagated out of `run_regenerate` itself (scene list
            // fetch, scene repository write, recomposition) happen before or
            // around the per-scene cascade, not as one scene's render
            // failure, so the source job really is in a failed state here.
            Ok(Err(e)) => {
                Self::fail_job(jobs, &owner_id, &source_job_id, &e).await;
                Err(e)
            }
            Err(_) => {
                let timeout_err = WorkerError::timeout("scene regeneration exceeded its whole-job deadline");
                Self::fail_job(jobs, &owner_id, &source_job_id, &timeout_err).await;
                Err(timeout_err)
            }
        }
    }

    /// Periodically renew the worker lease while a job is processing, so the
    /// claim-recovery loop doesn't mistake a live job for a crashed one.
    fn spawn_heartbeat(
        jobs: JobRepository,
        job: Job,
        worker_id: String,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            interval.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Some(mut current) = jobs.get(&job.owner_id, &job.id).await.ok().flatten() {
                            if current.renew_lease(&worker_id).is_ok() {
                                let _ = jobs.update(&current, None).await;
                            } else {
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    /// Mark a job `Failed` with its lease released after a stage error, so
    /// the next redelivery (or the DLQ sweep) finds a clean starting point.
    async fn fail_job(jobs: &JobRepository, owner_id: &str, job_id: &JobId, error: &WorkerError) {
        if let Ok(Some(current)) = jobs.get(owner_id, job_id).await {
            let failed = current.fail(error.to_string());
            let _ = jobs.update(&failed, None).await;
        }
    }

    async fn mark_dead_lettered(jobs: &JobRepository, queue_job: &QueueJob, error: &str) {
        let _ = error;
        let (owner_id, job_id) = (queue_job.owner_id(), Self::target_job_id(queue_job));
        if let Ok(Some(current)) = jobs.get(owner_id, job_id).await {
            let dead = current.dead_letter();
            let _ = jobs.update(&dead, None).await;
        }
    }

    fn target_job_id(queue_job: &QueueJob) -> &JobId {
        match queue_job {
            QueueJob::GenerateVideo(q) => &q.job_id,
            QueueJob::RegenerateScene(q) => &q.source_job_id,
        }
    }
}
