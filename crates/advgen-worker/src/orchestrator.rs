//! The pipeline driver: script -> scenes -> audio -> composition -> finalize,
//! plus the scoped scene-regeneration/cascade subpath.
//!
//! Every stage method takes ownership of the `Job` it's resuming and hands
//! back the updated record once the stage's durable writes have landed, so
//! a crash between stages always resumes cleanly from `Job::stage`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use advgen_jobstore::{JobRepository, SceneRepository};
use advgen_media::{concat_scenes, extract_last_frame, mix_audio_onto_video, transcode_to_webm, ConcatInput, MixTrack};
use advgen_modelclients::{
    poll_until_cancelable, with_backoff, BackoffPolicy, MusicClient, MusicRequest, NarratorClient,
    NarratorRequest, PollPolicy, ScriptClient, ScriptDraft, ScriptRequest, SceneDraft, SceneVideoClient,
    SceneVideoRequest,
};
use advgen_models::{AudioSpec, Job, JobId, JobState, ProgressEvent, Scene, SceneState, Stage, Voice};
use advgen_queue::ProgressBus;
use advgen_storage::R2Client;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

const CONTENT_TYPE_MP4: &str = "video/mp4";
const CONTENT_TYPE_WEBM: &str = "video/webm";
const CONTENT_TYPE_JPEG: &str = "image/jpeg";
const CONTENT_TYPE_MP3: &str = "audio/mpeg";

/// Narration volume relative to music in the final mix; music ducks under it.
const NARRATION_VOLUME: f64 = 1.0;
const MUSIC_VOLUME: f64 = advgen_models::MUSIC_MIX_LEVEL;
const SIDE_EFFECT_VOLUME: f64 = 1.0;

/// How long a presigned start-image URL handed to a provider stays valid.
const START_IMAGE_PRESIGN_TTL: std::time::Duration = std::time::Duration::from_secs(3600);

/// Drives one job end-to-end (or one scoped scene regeneration) through the
/// pipeline, holding the collaborators every stage needs: the durable
/// JobStore/SceneRepository, the AssetStore, the four generative-provider
/// adapters, and the ProgressStream publisher.
pub struct Orchestrator {
    config: WorkerConfig,
    jobs: JobRepository,
    scenes: SceneRepository,
    assets: R2Client,
    script_client: ScriptClient,
    scene_video_client: SceneVideoClient,
    music_client: MusicClient,
    narrator_client: NarratorClient,
    progress: ProgressBus,
}

/// Outcome of a (possibly cascading) scene regeneration. A cascade stops at
/// the first scene that fails to render rather than failing the whole
/// request: the already-`completed` source job stays `completed`,
/// recomposed from however many scenes did regenerate, and the caller is
/// told exactly how far the cascade got.
pub struct RegenerateOutcome {
    /// How many scenes (including the requested one) were successfully
    /// regenerated before the cascade stopped.
    pub scenes_regenerated: u32,
    /// Index of the first scene that failed to regenerate, if any.
    pub failed_scene: Option<u32>,
    /// The failing scene's error, if any.
    pub error: Option<String>,
}

impl Orchestrator {
    pub fn new(
        config: WorkerConfig,
        jobs: JobRepository,
        scenes: SceneRepository,
        assets: R2Client,
        script_client: ScriptClient,
        scene_video_client: SceneVideoClient,
        music_client: MusicClient,
        narrator_client: NarratorClient,
        progress: ProgressBus,
    ) -> Self {
        Self {
            config,
            jobs,
            scenes,
            assets,
            script_client,
            scene_video_client,
            music_client,
            narrator_client,
            progress,
        }
    }

    /// Run a fresh `GenerateVideo` job through every stage it hasn't
    /// already passed, resuming at `job.stage`.
    pub async fn run_generate(&self, mut job: Job, cancel: &CancellationToken) -> WorkerResult<Job> {
        if job.stage == Stage::Admitted {
            job = self.run_script_stage(job, cancel).await?;
        }
        if job.stage == Stage::Script {
            job = self.run_scenes_stage(job, cancel).await?;
        }
        if job.stage == Stage::Scenes {
            job = self.run_audio_stage(job, cancel).await?;
        }
        if job.stage == Stage::Audio {
            job = self.run_composition_stage(job, cancel).await?;
        }
        Ok(job)
    }

    /// Re-render one scene of an already-composed job, using the previous
    /// scene's current last frame as the start image, then recompose. If
    /// `cascade`, every downstream scene is re-rendered too, chained off
    /// this scene's new last frame.
    pub async fn run_regenerate(
        &self,
        job: &mut Job,
        source_job_owner: &str,
        source_job_id: &JobId,
        scene_index: u32,
        cascade: bool,
        cancel: &CancellationToken,
    ) -> WorkerResult<RegenerateOutcome> {
        let mut scenes = self.scenes.list(source_job_owner, source_job_id).await?;
        scenes.sort_by_key(|s| s.index);

        let last_index = scenes.len().saturating_sub(1) as u32;
        let compliance = job.side_effects_text.is_some();

        let start_image = if scene_index == 0 {
            job.product_image_asset_key.clone().filter(|_| compliance && last_index == 0)
        } else {
            scenes
                .iter()
                .find(|s| s.index == scene_index - 1)
                .and_then(|s| s.last_frame_asset_key.clone())
        };

        let upper_bound = if cascade { last_index } else { scene_index };
        let mut prev_frame = start_image;
        let mut scenes_regenerated = 0u32;
        let mut failure: Option<(u32, WorkerError)> = None;

        for scene in scenes.iter_mut().filter(|s| s.index >= scene_index && s.index <= upper_bound) {
            let is_final = scene.index == last_index;
            let this_start_image = if compliance && is_final {
                job.product_image_asset_key.clone()
            } else {
                prev_frame.clone()
            };

            let regenerated = scene.clone().regenerate();
            self.scenes.update(source_job_owner, source_job_id, &regenerated).await?;

            let render_result = self
                .render_one_scene(
                    source_job_owner,
                    source_job_id,
                    regenerated,
                    this_start_image,
                    job.aspect_ratio,
                    cancel,
                )
                .await;

            match render_result {
                Ok(rendered) => {
                    prev_frame = rendered.last_frame_asset_key.clone();
                    job.set_scene_version(rendered.index, rendered.version);
                    *scene = rendered;
                    scenes_regenerated += 1;
                }
                Err(e) => {
                    warn!(
                        job_id = %source_job_id,
                        scene = scene.index,
                        error = %e,
                        "scene regeneration failed, stopping cascade with partial progress"
                    );
                    failure = Some((scene.index, e));
                    break;
                }
            }
        }

        if scenes_regenerated > 0 {
            job.clip_version += 1;
            *job = self.run_composition_from_scenes(job.clone(), &scenes).await?;
        }

        Ok(RegenerateOutcome {
            scenes_regenerated,
            failed_scene: failure.as_ref().map(|(index, _)| *index),
            error: failure.map(|(_, e)| e.to_string()),
        })
    }

    // ---- Script stage ----------------------------------------------------

    async fn run_script_stage(&self, mut job: Job, cancel: &CancellationToken) -> WorkerResult<Job> {
        self.emit_stage(&job, Stage::Script).await;

        let allowed: Vec<u32> = self.scene_video_client.clip_sizes().to_vec();
        let request = ScriptRequest {
            prompt: job.prompt.clone(),
            duration_s: job.duration_s,
            style_controls: job.style_controls.as_ref().map(|s| s.as_str().to_string()),
            allowed_clip_sizes: allowed.clone(),
        };

        let draft = self.run_script_request(request.clone(), cancel).await?;
        let draft = if Self::script_is_valid(&draft, job.duration_s, &allowed) {
            draft
        } else {
            warn!(job_id = %job.id, "script draft failed the duration/clip-size contract, repairing once");
            let mut repair_request = request;
            repair_request.prompt = format!(
                "{}\n\nReturn scenes whose durations sum to exactly {} seconds, each duration drawn only from {:?}.",
                repair_request.prompt, job.duration_s, allowed
            );
            let repaired = self.run_script_request(repair_request, cancel).await?;
            if !Self::script_is_valid(&repaired, job.duration_s, &allowed) {
                return Err(WorkerError::script_invalid(format!(
                    "script scenes (sum {}s, durations {:?}) do not satisfy duration_s={} / allowed_clip_sizes={:?} after repair",
                    repaired.total_duration_s(),
                    repaired.scenes.iter().map(|s| s.duration_s).collect::<Vec<_>>(),
                    job.duration_s,
                    allowed,
                )));
            }
            repaired
        };

        let scenes = Self::scenes_from_draft(&draft);
        self.scenes.create_all(&job.owner_id, &job.id, &scenes).await?;

        let voice = Voice::new(job.voice.clone()).unwrap_or_default();
        let mut audio_spec = AudioSpec::new(draft.narration_script(), voice, draft.music_prompt.clone(), job.duration_s);
        if let Some(text) = job.side_effects_text.clone() {
            audio_spec = audio_spec.with_side_effect(text);
        }

        job.title = Some(draft.title);
        job.scenes_total = scenes.len() as u32;
        job.audio_spec = Some(audio_spec);
        job = job.advance_to(Stage::Script);
        job = self.jobs.update(&job, None).await?;
        Ok(job)
    }

    fn scenes_from_draft(draft: &ScriptDraft) -> Vec<Scene> {
        draft
            .scenes
            .iter()
            .enumerate()
            .map(|(i, s): (usize, &SceneDraft)| {
                let mut scene = Scene::new(i as u32, s.visual_prompt.clone(), s.narration_line.clone(), s.duration_s);
                scene.transition_out = s.transition_out;
                scene
            })
            .collect()
    }

    fn script_is_valid(draft: &ScriptDraft, duration_s: u32, allowed: &[u32]) -> bool {
        !draft.scenes.is_empty()
            && draft.total_duration_s() == duration_s
            && draft.scenes.iter().all(|s| allowed.contains(&s.duration_s))
    }

    async fn run_script_request(&self, request: ScriptRequest, cancel: &CancellationToken) -> WorkerResult<ScriptDraft> {
        let handle = with_backoff("script.start", BackoffPolicy::default(), || {
            self.script_client.start(request.clone())
        })
        .await
        .map_err(|e| WorkerError::provider(e.to_string()))?;

        tokio::time::timeout(
            self.config.script_timeout,
            poll_until_cancelable(
                &self.script_client,
                &handle,
                PollPolicy::new(self.config.poll_interval, self.config.max_attempts),
                cancel,
            ),
        )
        .await
        .map_err(|_| WorkerError::timeout("script stage deadline exceeded"))?
        .map_err(|e| WorkerError::provider(e.to_string()))
    }

    // ---- Scenes stage ------------------------------------------------------

    async fn run_scenes_stage(&self, mut job: Job, cancel: &CancellationToken) -> WorkerResult<Job> {
        self.emit_stage(&job, Stage::Scenes).await;

        let mut scenes = self.scenes.list(&job.owner_id, &job.id).await?;
        scenes.sort_by_key(|s| s.index);

        let owner_id = job.owner_id.clone();
        let job_id = job.id.clone();
        let aspect_ratio = job.aspect_ratio;
        let compliance = job.side_effects_text.is_some();
        let product_image = job.product_image_asset_key.clone();
        let last_index = scenes.len().saturating_sub(1) as u32;

        // One oneshot per scene: each scene publishes its last-frame key on
        // its channel as soon as it has one, so the next scene's generation
        // can begin immediately instead of waiting for this scene's clip
        // to finish uploading/persisting. This is the pipelining: scene n's
        // semaphore permit is released the moment its frame is published,
        // not when the scene is fully done.
        let mut frame_txs: Vec<Option<oneshot::Sender<Option<String>>>> = Vec::with_capacity(scenes.len());
        let mut frame_rxs: Vec<Option<oneshot::Receiver<Option<String>>>> = Vec::with_capacity(scenes.len());
        for _ in &scenes {
            let (tx, rx) = oneshot::channel();
            frame_txs.push(Some(tx));
            frame_rxs.push(Some(rx));
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_scenes.max(1)));
        let mut tasks = Vec::with_capacity(scenes.len());

        for (i, scene) in scenes.into_iter().enumerate() {
            let index = i as u32;

            if scene.state == SceneState::Ready {
                if let Some(tx) = frame_txs[i].take() {
                    let _ = tx.send(scene.last_frame_asset_key.clone());
                }
                continue;
            }

            let prev_rx = if i > 0 { frame_rxs[i - 1].take() } else { None };
            let next_tx = frame_txs[i].take();
            let permit_src = Arc::clone(&semaphore);
            let owner_id = owner_id.clone();
            let job_id = job_id.clone();
            let product_image = product_image.clone();
            let cancel = cancel.clone();

            tasks.push(async move {
                let start_image = if compliance && index == last_index {
                    product_image
                } else if let Some(rx) = prev_rx {
                    rx.await.unwrap_or(None)
                } else {
                    None
                };

                let _permit = permit_src
                    .acquire_owned()
                    .await
                    .map_err(|_| WorkerError::internal("scene semaphore closed"))?;

                let outcome = self
                    .render_one_scene(&owner_id, &job_id, scene, start_image, aspect_ratio, &cancel)
                    .await;

                match outcome {
                    Ok(ready) => {
                        if let Some(tx) = next_tx {
                            let _ = tx.send(ready.last_frame_asset_key.clone());
                        }
                        drop(_permit);
                        self.progress
                            .emit(
                                &job_id,
                                ProgressEvent::scene_ready(index, ready.clip_asset_key.clone().unwrap_or_default()),
                            )
                            .await
                            .ok();
                        Ok(ready)
                    }
                    Err(e) => {
                        if let Some(tx) = next_tx {
                            let _ = tx.send(None);
                        }
                        drop(_permit);
                        Err(e)
                    }
                }
            });
        }

        let results = futures::future::join_all(tasks).await;
        let mut rendered = Vec::with_capacity(results.len());
        for result in results {
            rendered.push(result?);
        }

        job.scenes_completed = rendered.len() as u32;
        for scene in &rendered {
            job.set_scene_version(scene.index, scene.version);
        }
        job = job.advance_to(Stage::Scenes);
        job = self.jobs.update(&job, None).await?;
        self.emit_progress(&job).await;
        Ok(job)
    }

    /// Render a single scene end-to-end: Start/Poll the scene-video
    /// provider, download the clip, extract its last frame, upload both to
    /// the AssetStore, and persist the updated `Scene` record. Shared by
    /// the initial scenes stage and the regeneration subpath.
    async fn render_one_scene(
        &self,
        owner_id: &str,
        job_id: &JobId,
        scene: Scene,
        start_image: Option<String>,
        aspect_ratio: advgen_models::AspectRatio,
        cancel: &CancellationToken,
    ) -> WorkerResult<Scene> {
        let index = scene.index;
        let version = scene.version;
        let mut scene = scene.start_generating();
        scene.start_image_asset_key = start_image.clone();
        self.scenes.update(owner_id, job_id, &scene).await?;

        let render_result: WorkerResult<(String, String)> = async {
            let start_image_url = match &start_image {
                Some(key) => Some(self.assets.presign_get(key, START_IMAGE_PRESIGN_TTL).await?),
                None => None,
            };

            let request = SceneVideoRequest {
                visual_prompt: scene.visual_prompt.clone(),
                duration_s: scene.duration_s,
                aspect_ratio,
                start_image_url,
            };

            let handle = with_backoff("scene_video.start", BackoffPolicy::default(), || {
                self.scene_video_client.start(request.clone())
            })
            .await
            .map_err(|e| WorkerError::provider(e.to_string()))?;

            let artifact = tokio::time::timeout(
                self.config.scene_timeout,
                poll_until_cancelable(
                    &self.scene_video_client,
                    &handle,
                    PollPolicy::new(self.config.poll_interval, self.config.max_attempts),
                    cancel,
                ),
            )
            .await
            .map_err(|_| WorkerError::timeout(format!("scene {index} deadline exceeded")))?
            .map_err(|e| WorkerError::provider(e.to_string()))?;

            let local_clip = self.local_path(job_id, &format!("scene-{index:03}-v{version}.mp4"));
            download_to_file(&artifact.video_url, &local_clip).await?;

            let local_frame = self.local_path(job_id, &format!("scene-{index:03}-v{version}.jpg"));
            extract_last_frame(&local_clip, &local_frame).await?;

            let clip_key = self.scene_clip_key(owner_id, job_id, index, version);
            let frame_key = self.scene_frame_key(owner_id, job_id, index, version);
            self.assets.upload_file(&local_clip, &clip_key, CONTENT_TYPE_MP4).await?;
            self.assets.upload_file(&local_frame, &frame_key, CONTENT_TYPE_JPEG).await?;

            let _ = tokio::fs::remove_file(&local_clip).await;
            let _ = tokio::fs::remove_file(&local_frame).await;

            Ok((clip_key, frame_key))
        }
        .await;

        match render_result {
            Ok((clip_key, frame_key)) => {
                let ready = scene.ready(clip_key, frame_key);
                let ready = self.scenes.update(owner_id, job_id, &ready).await?;
                Ok(ready)
            }
            Err(e) => {
                let failed = scene.fail(e.to_string());
                self.scenes.update(owner_id, job_id, &failed).await.ok();
                Err(e)
            }
        }
    }

    // ---- Audio stage --------------------------------------------------------

    async fn run_audio_stage(&self, mut job: Job, cancel: &CancellationToken) -> WorkerResult<Job> {
        self.emit_stage(&job, Stage::Audio).await;

        let mut audio_spec = job
            .audio_spec
            .clone()
            .ok_or_else(|| WorkerError::internal("audio stage entered without an AudioSpec"))?;

        let (narration, music, side_effect) = tokio::try_join!(
            self.run_narration(&job, &audio_spec, cancel),
            self.run_music(&job, &audio_spec, cancel),
            self.run_side_effect(&job, &audio_spec, cancel),
        )?;

        audio_spec.narration_asset_key = Some(narration);
        audio_spec.music_asset_key = Some(music);
        audio_spec.side_effects_asset_key = side_effect;

        job.audio_spec = Some(audio_spec);
        job = job.advance_to(Stage::Audio);
        job = self.jobs.update(&job, None).await?;
        self.emit_progress(&job).await;
        Ok(job)
    }

    async fn run_narration(&self, job: &Job, spec: &AudioSpec, cancel: &CancellationToken) -> WorkerResult<String> {
        let request = NarratorRequest {
            text: spec.narration_script.clone(),
            voice: spec.voice.as_str().to_string(),
            speed: 1.0,
        };

        let handle = with_backoff("narrator.start", BackoffPolicy::default(), || {
            self.narrator_client.start(request.clone())
        })
        .await
        .map_err(|e| WorkerError::provider(e.to_string()))?;

        let artifact = tokio::time::timeout(
            self.config.audio_timeout,
            poll_until_cancelable(
                &self.narrator_client,
                &handle,
                PollPolicy::new(self.config.poll_interval, self.config.max_attempts),
                cancel,
            ),
        )
        .await
        .map_err(|_| WorkerError::timeout("narration synthesis deadline exceeded"))?
        .map_err(|e| WorkerError::provider(e.to_string()))?;

        let local = self.local_path(&job.id, "narration.mp3");
        download_to_file(&artifact.audio_url, &local).await?;
        let key = self.audio_asset_key(&job.owner_id, &job.id, "narration");
        self.assets.upload_file(&local, &key, CONTENT_TYPE_MP3).await?;
        let _ = tokio::fs::remove_file(&local).await;
        Ok(key)
    }

    async fn run_music(&self, job: &Job, spec: &AudioSpec, cancel: &CancellationToken) -> WorkerResult<String> {
        let request = MusicRequest {
            mood: spec.music_prompt.clone(),
            style: spec.music_prompt.clone(),
            duration_s: spec.duration_s,
        };

        let handle = with_backoff("music.start", BackoffPolicy::default(), || self.music_client.start(request.clone()))
            .await
            .map_err(|e| WorkerError::provider(e.to_string()))?;

        let artifact = tokio::time::timeout(
            self.config.audio_timeout,
            poll_until_cancelable(
                &self.music_client,
                &handle,
                PollPolicy::new(self.config.poll_interval, self.config.max_attempts),
                cancel,
            ),
        )
        .await
        .map_err(|_| WorkerError::timeout("music synthesis deadline exceeded"))?
        .map_err(|e| WorkerError::provider(e.to_string()))?;

        let local = self.local_path(&job.id, "music.mp3");
        download_to_file(&artifact.audio_url, &local).await?;
        let key = self.audio_asset_key(&job.owner_id, &job.id, "music");
        self.assets.upload_file(&local, &key, CONTENT_TYPE_MP3).await?;
        let _ = tokio::fs::remove_file(&local).await;
        Ok(key)
    }

    /// Synthesize the side-effects disclosure at 1.4x playback rate.
    /// Degrades gracefully: a failure here does not fail the job, since
    /// `AudioSpec::is_ready_for_composition` only requires narration/music.
    async fn run_side_effect(&self, job: &Job, spec: &AudioSpec, cancel: &CancellationToken) -> WorkerResult<Option<String>> {
        let Some(text) = spec.side_effects_text.clone() else {
            return Ok(None);
        };

        let request = NarratorRequest {
            text,
            voice: spec.voice.as_str().to_string(),
            speed: 1.4,
        };

        let result: Result<_, WorkerError> = async {
            let handle = with_backoff("narrator.start", BackoffPolicy::default(), || {
                self.narrator_client.start(request.clone())
            })
            .await
            .map_err(|e| WorkerError::provider(e.to_string()))?;

            let artifact = tokio::time::timeout(
                self.config.audio_timeout,
                poll_until_cancelable(
                    &self.narrator_client,
                    &handle,
                    PollPolicy::new(self.config.poll_interval, self.config.max_attempts),
                    cancel,
                ),
            )
            .await
            .map_err(|_| WorkerError::timeout("side-effect synthesis deadline exceeded"))?
            .map_err(|e| WorkerError::provider(e.to_string()))?;

            let local = self.local_path(&job.id, "side_effect.mp3");
            download_to_file(&artifact.audio_url, &local).await?;
            let key = self.audio_asset_key(&job.owner_id, &job.id, "side_effects");
            self.assets.upload_file(&local, &key, CONTENT_TYPE_MP3).await?;
            let _ = tokio::fs::remove_file(&local).await;
            Ok(key)
        }
        .await;

        match result {
            Ok(key) => Ok(Some(key)),
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "side-effect synthesis failed, composing without it");
                Ok(None)
            }
        }
    }

    // ---- Composition stage --------------------------------------------------

    async fn run_composition_stage(&self, job: Job, cancel: &CancellationToken) -> WorkerResult<Job> {
        let _ = cancel;
        self.emit_stage(&job, Stage::Composition).await;
        let mut scenes = self.scenes.list(&job.owner_id, &job.id).await?;
        scenes.sort_by_key(|s| s.index);
        self.run_composition_from_scenes(job, &scenes).await
    }

    async fn run_composition_from_scenes(&self, mut job: Job, scenes: &[Scene]) -> WorkerResult<Job> {
        self.emit_stage(&job, Stage::Composition).await;

        let audio_spec = job
            .audio_spec
            .clone()
            .ok_or_else(|| WorkerError::internal("composition entered without an AudioSpec"))?;
        if !audio_spec.is_ready_for_composition() {
            return Err(WorkerError::internal("composition entered before narration/music were ready"));
        }

        let work_dir = self.job_work_dir(&job.id);
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(WorkerError::Io)?;

        let mut concat_inputs = Vec::with_capacity(scenes.len());
        for scene in scenes {
            let clip_key = scene
                .clip_asset_key
                .clone()
                .ok_or_else(|| WorkerError::internal(format!("scene {} has no clip asset", scene.index)))?;
            let local_clip = self.local_path(&job.id, &format!("compose-scene-{:03}.mp4", scene.index));
            self.assets
                .download_file(&clip_key, &local_clip)
                .await
                .map_err(WorkerError::Storage)?;

            // `concat_scenes` only knows cut-or-crossfade; every non-cut
            // variant (fade/wipe/zoom) renders as a crossfade of its own
            // duration, per `Transition::duration_ms`.
            concat_inputs.push(ConcatInput {
                path: local_clip,
                duration_s: scene.duration_s as f64,
                crossfade_into_next_ms: scene.transition_out.duration_ms(),
            });
        }

        let silent_video = self.local_path(&job.id, "concat.mp4");
        concat_scenes(&concat_inputs, &silent_video).await?;

        let narration_key = audio_spec.narration_asset_key.clone().expect("checked above");
        let music_key = audio_spec.music_asset_key.clone().expect("checked above");
        let local_narration = self.local_path(&job.id, "narration.mp3");
        let local_music = self.local_path(&job.id, "music.mp3");
        self.assets.download_file(&narration_key, &local_narration).await.map_err(WorkerError::Storage)?;
        self.assets.download_file(&music_key, &local_music).await.map_err(WorkerError::Storage)?;

        let mut tracks = vec![
            MixTrack { path: local_narration, volume: NARRATION_VOLUME, start_offset_s: 0.0 },
            MixTrack { path: local_music, volume: MUSIC_VOLUME, start_offset_s: 0.0 },
        ];

        if let (Some(key), Some(start)) = (&audio_spec.side_effects_asset_key, audio_spec.side_effects_start_time_s) {
            let local_side_effect = self.local_path(&job.id, "side_effect.mp3");
            self.assets.download_file(key, &local_side_effect).await.map_err(WorkerError::Storage)?;
            tracks.push(MixTrack { path: local_side_effect, volume: SIDE_EFFECT_VOLUME, start_offset_s: start });
        }

        let mixed = self.local_path(&job.id, "mixed.mp4");
        mix_audio_onto_video(&silent_video, &tracks, &mixed).await?;

        let webm = self.local_path(&job.id, "final.webm");
        let webm_uploaded = match transcode_to_webm(&mixed, &webm).await {
            Ok(()) => true,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "webm transcode failed, delivering mp4 only");
                false
            }
        };

        let thumbnail = self.local_path(&job.id, "thumbnail.jpg");
        extract_last_frame(&concat_inputs[0].path, &thumbnail).await.ok();

        let mp4_key = self.final_asset_key(&job.owner_id, &job.id, job.clip_version, "mp4");
        self.assets.upload_file(&mixed, &mp4_key, CONTENT_TYPE_MP4).await?;

        let webm_key = if webm_uploaded {
            let key = self.final_asset_key(&job.owner_id, &job.id, job.clip_version, "webm");
            self.assets.upload_file(&webm, &key, CONTENT_TYPE_WEBM).await?;
            Some(key)
        } else {
            None
        };

        let thumbnail_key = if thumbnail.exists() {
            let key = self.thumbnail_asset_key(&job.owner_id, &job.id);
            self.assets.upload_file(&thumbnail, &key, CONTENT_TYPE_JPEG).await.ok().map(|_| key)
        } else {
            None
        };

        let _ = tokio::fs::remove_dir_all(&work_dir).await;

        job = job.with_final_assets(mp4_key.clone(), webm_key, thumbnail_key);
        job = job.advance_to(Stage::Done);
        job = job.complete();
        job = self.jobs.update(&job, None).await?;

        self.progress.emit(&job.id, ProgressEvent::done(mp4_key)).await.ok();
        self.progress.complete_job_status(&job.id).await.ok();
        info!(job_id = %job.id, "job completed");
        Ok(job)
    }

    // ---- Shared helpers ------------------------------------------------------

    async fn emit_stage(&self, job: &Job, stage: Stage) {
        self.progress
            .advance_stage(&job.id, JobState::Processing, stage, job.scenes_completed, job.scenes_total)
            .await
            .ok();
    }

    async fn emit_progress(&self, job: &Job) {
        self.progress
            .advance_stage(&job.id, JobState::Processing, job.stage, job.scenes_completed, job.scenes_total)
            .await
            .ok();
    }

    fn job_work_dir(&self, job_id: &JobId) -> PathBuf {
        Path::new(&self.config.work_dir).join(job_id.as_str())
    }

    fn local_path(&self, job_id: &JobId, file_name: &str) -> PathBuf {
        self.job_work_dir(job_id).join(file_name)
    }

    fn scene_clip_key(&self, owner_id: &str, job_id: &JobId, index: u32, version: u32) -> String {
        format!("users/{owner_id}/jobs/{job_id}/scenes/{index:03}/v{version}.mp4")
    }

    fn scene_frame_key(&self, owner_id: &str, job_id: &JobId, index: u32, version: u32) -> String {
        format!("users/{owner_id}/jobs/{job_id}/scenes/{index:03}/v{version}_last_frame.jpg")
    }

    fn audio_asset_key(&self, owner_id: &str, job_id: &JobId, track: &str) -> String {
        format!("users/{owner_id}/jobs/{job_id}/audio/{track}.mp3")
    }

    fn final_asset_key(&self, owner_id: &str, job_id: &JobId, clip_version: u32, ext: &str) -> String {
        format!("users/{owner_id}/jobs/{job_id}/final/v{clip_version}.{ext}")
    }

    fn thumbnail_asset_key(&self, owner_id: &str, job_id: &JobId) -> String {
        format!("users/{owner_id}/jobs/{job_id}/final/thumbnail.jpg")
    }
}

/// Fetch a provider-returned artifact URL to a local file. Providers hand
/// back plain HTTPS URLs rather than going through the AssetStore directly,
/// since the clip/track hasn't been persisted anywhere durable yet.
async fn download_to_file(url: &str, dest: impl AsRef<Path>) -> WorkerResult<()> {
    let dest = dest.as_ref();
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(WorkerError::Io)?;
    }

    let response = reqwest::get(url)
        .await
        .map_err(|e| WorkerError::provider(format!("fetching {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(WorkerError::provider(format!("fetching {url}: HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| WorkerError::provider(format!("reading body of {url}: {e}")))?;

    tokio::fs::write(dest, &bytes).await.map_err(WorkerError::Io)?;
    Ok(())
}
