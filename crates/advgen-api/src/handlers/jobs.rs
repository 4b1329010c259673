//! Job submission, listing, detail, deletion, and scene-regeneration
//! handlers — the REST surface around the durable `Job` record.
//!
//! `GET /jobs/{id}/progress` itself lives in `crate::ws`; the history
//! endpoint here is the polling fallback for clients that cannot hold a
//! WebSocket open.

use std::str::FromStr;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use advgen_models::{AspectRatio, Job, JobId, JobState};
use advgen_queue::{GenerateVideoJob, RegenerateSceneJob};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::{
    self, is_valid_asset_key, is_valid_job_id, validate_aspect_ratio, validate_duration,
};
use crate::state::AppState;

/// How long a presigned artifact URL handed back in a job response stays
/// valid. Short enough that a leaked response body isn't a long-lived
/// download link, long enough to outlive a normal page view.
const ASSET_URL_TTL: Duration = Duration::from_secs(3600);

/// How long an Idempotency-Key lock on `POST /generate` is held.
const IDEMPOTENCY_TTL_SECS: u64 = 300;

// ============================================================================
// Request/response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub duration_s: u32,
    pub aspect_ratio: String,
    #[serde(default)]
    pub style_controls: Option<String>,
    #[serde(default)]
    pub side_effects_text: Option<String>,
    #[serde(default)]
    pub product_image_asset_key: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub job_id: String,
    pub status: String,
    pub estimated_completion_seconds: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub page_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A `Job` record as exposed to its owner, with AssetStore keys swapped for
/// short-lived presigned download URLs.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub status: String,
    pub stage: String,
    pub prompt: String,
    pub duration_s: u32,
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub scenes_completed: u32,
    pub scenes_total: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mp4_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webm_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateQuery {
    #[serde(default)]
    pub cascade: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub job_id: String,
    pub scene_number: u32,
    pub status: String,
    pub cascade: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProgressHistoryQuery {
    #[serde(default)]
    pub since: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProgressHistoryResponse {
    pub job_id: String,
    pub events: Vec<serde_json::Value>,
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /generate`
pub async fn submit_job(
    State(state): State<AppState>,
    user: AuthUser,
    headers: axum::http::HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<GenerateResponse>)> {
    state.admission.check(&user.uid, user.tier).await?;

    let prompt = security::sanitize_string(req.prompt.trim());
    if prompt.is_empty() || prompt.len() > security::MAX_PROMPT_LENGTH {
        return Err(ApiError::validation(format!(
            "prompt must be 1-{} characters",
            security::MAX_PROMPT_LENGTH
        )));
    }

    if !validate_duration(req.duration_s, state.scene_video_clip_sizes) {
        return Err(ApiError::validation(format!(
            "duration_s must be in [10,60] and a multiple of one of {:?}",
            state.scene_video_clip_sizes
        )));
    }

    let aspect_ratio = AspectRatio::from_str(&req.aspect_ratio)
        .map_err(|e| ApiError::validation(format!("invalid aspect_ratio: {e}")))?;
    if !validate_aspect_ratio(&aspect_ratio) {
        return Err(ApiError::validation("unsupported aspect_ratio"));
    }

    let style_controls = req
        .style_controls
        .map(advgen_models::StyleControls::new)
        .transpose()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    if let Some(text) = &req.side_effects_text {
        if text.is_empty() || text.len() > security::MAX_SIDE_EFFECTS_TEXT_LENGTH {
            return Err(ApiError::validation(format!(
                "side_effects_text must be 1-{} characters",
                security::MAX_SIDE_EFFECTS_TEXT_LENGTH
            )));
        }
        if req.product_image_asset_key.is_none() {
            return Err(ApiError::validation(
                "side_effects_text requires product_image_asset_key (compliance mode needs a product still for the final frame)",
            ));
        }
    }

    if let Some(key) = &req.product_image_asset_key {
        if !is_valid_asset_key(key, &user.uid) {
            return Err(ApiError::validation("invalid or unowned product_image_asset_key"));
        }
    }

    let idempotency_header = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let idempotency_key = idempotency_header
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Some(key) = &idempotency_header {
        let lock_key = format!("generate:{}:{}", user.uid, key);
        let acquired = state.queue.try_acquire_idempotency(&lock_key, IDEMPOTENCY_TTL_SECS).await?;
        if !acquired {
            return Err(ApiError::conflict("duplicate request already in flight"));
        }
    }

    let voice = req.voice.unwrap_or_else(|| "narrator-default".to_string());

    let mut job = Job::new_generate_video(
        user.uid.clone(),
        prompt.clone(),
        req.duration_s,
        aspect_ratio,
        voice.clone(),
        format!("{}:{}", user.uid, idempotency_key),
    );
    job.style_controls = style_controls.clone();
    job.side_effects_text = req.side_effects_text.clone();
    job.product_image_asset_key = req.product_image_asset_key.clone();

    let job = state.jobs.create(&job).await?;

    let queue_job = GenerateVideoJob::new(
        user.uid.clone(),
        job.id.clone(),
        prompt,
        req.duration_s,
        aspect_ratio,
        voice,
    )
    .with_style_controls(style_controls)
    .with_side_effects_text(req.side_effects_text)
    .with_product_image_asset_key(req.product_image_asset_key);

    state.queue.enqueue_generate(queue_job).await?;
    crate::metrics::record_job_enqueued("generate_video");

    info!(job_id = %job.id, owner = %user.uid, "job submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            job_id: job.id.to_string(),
            status: job.state.as_str().to_string(),
            estimated_completion_seconds: estimate_completion_seconds(req.duration_s),
        }),
    ))
}

/// `GET /jobs`
pub async fn list_jobs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<ListJobsResponse>> {
    let status = query
        .status
        .as_deref()
        .map(parse_job_state)
        .transpose()?;

    let page = state
        .jobs
        .query_by_owner(
            &user.uid,
            advgen_jobstore::JobQuery {
                status,
                page_size: query.page_size,
                page_token: query.page_token,
            },
        )
        .await?;

    let mut jobs = Vec::with_capacity(page.jobs.len());
    for job in page.jobs {
        jobs.push(to_job_view(&state, &job).await?);
    }

    Ok(Json(ListJobsResponse {
        jobs,
        next_page_token: page.next_page_token,
    }))
}

/// `GET /jobs/{id}`
pub async fn get_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobView>> {
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::validation("invalid job id format"));
    }

    let job = state
        .jobs
        .get(&user.uid, &JobId::from_string(job_id))
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    Ok(Json(to_job_view(&state, &job).await?))
}

/// `DELETE /jobs/{id}`
pub async fn delete_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<StatusCode> {
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::validation("invalid job id format"));
    }

    let job_id = JobId::from_string(job_id);
    let job = state
        .jobs
        .get(&user.uid, &job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    if job.has_active_lease() || job.state == JobState::Processing {
        return Err(ApiError::conflict("job is currently processing"));
    }

    for key in job_asset_keys(&job) {
        state.storage.delete_object(&key).await?;
    }
    state.jobs.delete(&user.uid, &job_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /jobs/{id}/scenes/{n}/regenerate`
///
/// Enqueues a scoped regeneration job rather than rendering inline — like
/// every other stage, the actual render goes through the worker pipeline so
/// crashes mid-regeneration recover the same way a full run would.
pub async fn regenerate_scene(
    State(state): State<AppState>,
    user: AuthUser,
    Path((job_id, scene_number)): Path<(String, u32)>,
    Query(query): Query<RegenerateQuery>,
) -> ApiResult<(StatusCode, Json<RegenerateResponse>)> {
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::validation("invalid job id format"));
    }

    let source_job_id = JobId::from_string(job_id);
    let source = state
        .jobs
        .get(&user.uid, &source_job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    if source.state != JobState::Completed {
        return Err(ApiError::conflict("job must be completed before a scene can be regenerated"));
    }
    if source.has_active_lease() {
        return Err(ApiError::conflict("job has an in-flight worker lease"));
    }
    if scene_number == 0 {
        return Err(ApiError::validation("scene_number is 1-based; scene 0 doesn't exist"));
    }
    let scene_index = scene_number - 1;
    if scene_index >= source.scenes_total {
        return Err(ApiError::validation(format!(
            "scene_number out of range (job has {} scenes)",
            source.scenes_total
        )));
    }

    let cascade = query.cascade.unwrap_or(0) != 0;

    // Regeneration mutates the source job in place rather than spawning a
    // separate tracking job, so polling `GET /jobs/{id}` on the same id the
    // client already has reflects the regenerate's progress.
    let queue_job = RegenerateSceneJob::new(
        user.uid.clone(),
        source_job_id.clone(),
        source_job_id.clone(),
        scene_index,
        cascade,
    );

    state.queue.enqueue_regenerate(queue_job).await?;
    crate::metrics::record_job_enqueued("regenerate_scene");

    Ok((
        StatusCode::ACCEPTED,
        Json(RegenerateResponse {
            job_id: source_job_id.to_string(),
            scene_number,
            status: JobState::Pending.as_str().to_string(),
            cascade,
        }),
    ))
}

/// `GET /jobs/{id}/progress/history` — polling fallback for clients that
/// cannot hold the `/jobs/{id}/progress` WebSocket open.
pub async fn get_progress_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<String>,
    Query(query): Query<ProgressHistoryQuery>,
) -> ApiResult<Json<ProgressHistoryResponse>> {
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::validation("invalid job id format"));
    }

    let job_id_typed = JobId::from_string(job_id.clone());

    // Ownership check against the durable record before touching the cache.
    state
        .jobs
        .get(&user.uid, &job_id_typed)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    let since = query.since.unwrap_or(0);
    let history = state.progress.get_history_since(&job_id_typed, since).await?;

    let events = history
        .into_iter()
        .filter_map(|e| {
            let mut value = serde_json::to_value(&e.event).ok()?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert("timestamp_ms".to_string(), serde_json::json!(e.timestamp_ms));
                obj.insert("seq".to_string(), serde_json::json!(e.seq));
            }
            Some(value)
        })
        .collect();

    Ok(Json(ProgressHistoryResponse { job_id, events }))
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_job_state(s: &str) -> Result<JobState, ApiError> {
    match s {
        "pending" => Ok(JobState::Pending),
        "processing" => Ok(JobState::Processing),
        "completed" => Ok(JobState::Completed),
        "failed" => Ok(JobState::Failed),
        "dead_lettered" => Ok(JobState::DeadLettered),
        other => Err(ApiError::validation(format!("unknown status filter '{other}'"))),
    }
}

/// Rough wall-clock estimate surfaced to the client right after admission:
/// one clip-generation round trip per scene (run concurrently, so this is
/// dominated by a single scene's turnaround) plus a fixed composition tail.
fn estimate_completion_seconds(duration_s: u32) -> u32 {
    const PER_SCENE_SECONDS: u32 = 45;
    const COMPOSITION_TAIL_SECONDS: u32 = 30;
    PER_SCENE_SECONDS + COMPOSITION_TAIL_SECONDS + duration_s / 10
}

fn job_asset_keys(job: &Job) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(k) = &job.mp4_asset_key {
        keys.push(k.clone());
    }
    if let Some(k) = &job.webm_asset_key {
        keys.push(k.clone());
    }
    if let Some(k) = &job.thumbnail_asset_key {
        keys.push(k.clone());
    }
    if let Some(spec) = &job.audio_spec {
        if let Some(k) = &spec.narration_asset_key {
            keys.push(k.clone());
        }
        if let Some(k) = &spec.music_asset_key {
            keys.push(k.clone());
        }
        if let Some(k) = &spec.side_effects_asset_key {
            keys.push(k.clone());
        }
    }
    keys
}

async fn to_job_view(state: &AppState, job: &Job) -> ApiResult<JobView> {
    let mp4_url = match &job.mp4_asset_key {
        Some(key) => Some(state.storage.presign_get(key, ASSET_URL_TTL).await?),
        None => None,
    };
    let webm_url = match &job.webm_asset_key {
        Some(key) => Some(state.storage.presign_get(key, ASSET_URL_TTL).await?),
        None => None,
    };
    let thumbnail_url = match &job.thumbnail_asset_key {
        Some(key) => Some(state.storage.presign_get(key, ASSET_URL_TTL).await?),
        None => None,
    };

    Ok(JobView {
        job_id: job.id.to_string(),
        status: job.state.as_str().to_string(),
        stage: job.stage.as_str().to_string(),
        prompt: job.prompt.clone(),
        duration_s: job.duration_s,
        aspect_ratio: job.aspect_ratio.to_string(),
        title: job.title.clone(),
        scenes_completed: job.scenes_completed,
        scenes_total: job.scenes_total,
        error_message: job.error_message.clone(),
        created_at: job.created_at.to_rfc3339(),
        updated_at: job.updated_at.to_rfc3339(),
        mp4_url,
        webm_url,
        thumbnail_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_completion_scales_with_duration() {
        assert!(estimate_completion_seconds(60) > estimate_completion_seconds(10));
    }

    #[test]
    fn test_parse_job_state() {
        assert_eq!(parse_job_state("completed").unwrap(), JobState::Completed);
        assert!(parse_job_state("bogus").is_err());
    }
}
