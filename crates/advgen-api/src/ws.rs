//! `GET /jobs/{id}/progress`: the ProgressStream WebSocket.
//!
//! Sends an initial snapshot of the job's current stage, then forwards
//! `ProgressEvent`s published to the job's `ProgressBus` channel as they
//! happen. A poll of the durable `Job` record runs alongside the bus
//! subscription so a client still sees the terminal state even if the
//! worker's final publish raced the subscribe, or Redis dropped the message.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{info, warn};

use advgen_models::{Job, JobId, JobState, ProgressEvent};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::is_valid_job_id;
use crate::state::AppState;

const WS_SEND_BUFFER_SIZE: usize = 32;
/// How often the durable `Job` record is re-read as a fallback to the bus
/// subscription.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// A connection with no bus event, poll-detected change, or client pong in
/// this long is assumed abandoned.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

static ACTIVE_PROGRESS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

async fn send_json(tx: &mpsc::Sender<Message>, value: &serde_json::Value) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(j) => j,
        Err(_) => return false,
    };
    match tx.try_send(Message::Text(json.clone())) {
        Ok(_) => true,
        Err(mpsc::error::TrySendError::Full(_)) => tx.send(Message::Text(json)).await.is_ok(),
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

fn snapshot_message(job: &Job) -> serde_json::Value {
    serde_json::json!({
        "type": "snapshot",
        "status": job.state.as_str(),
        "stage": job.stage.as_str(),
        "scenes_completed": job.scenes_completed,
        "scenes_total": job.scenes_total,
        "error_message": job.error_message,
    })
}

async fn done_message(state: &AppState, job: &Job) -> ApiResult<serde_json::Value> {
    const ASSET_URL_TTL: Duration = Duration::from_secs(3600);

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

    Ok(serde_json::json!({
        "type": "done",
        "job_id": job.id.to_string(),
        "mp4_url": mp4_url,
        "webm_url": webm_url,
        "thumbnail_url": thumbnail_url,
    }))
}

fn failed_message(job: &Job) -> serde_json::Value {
    serde_json::json!({
        "type": "error",
        "job_id": job.id.to_string(),
        "message": job.error_message.clone().unwrap_or_else(|| "job failed".to_string()),
        "terminal": job.state == JobState::DeadLettered,
    })
}

fn error_payload(error: &ApiError) -> serde_json::Value {
    serde_json::json!({
        "type": "error",
        "message": error.to_string(),
        "terminal": true,
    })
}

/// `GET /jobs/{id}/progress`
pub async fn progress_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !is_valid_job_id(&job_id) {
        return Err(ApiError::validation("invalid job id format"));
    }

    let job_id = JobId::from_string(job_id);
    let job = state
        .jobs
        .get(&user.uid, &job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    let count = ACTIVE_PROGRESS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection("progress");

    Ok(ws.on_upgrade(move |socket| async move {
        stream_progress(socket, state, user, job).await;
        let count = ACTIVE_PROGRESS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    }))
}

async fn stream_progress(socket: WebSocket, state: AppState, user: AuthUser, job: Job) {
    let (ws_sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(WS_SEND_BUFFER_SIZE);

    let send_task = tokio::spawn(async move {
        let mut ws_sender = ws_sender;
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    send_json(&tx, &snapshot_message(&job)).await;
    metrics::record_ws_message_sent("progress", "snapshot");

    if job.state.is_terminal() || job.state == JobState::Failed {
        let terminal = match job.state {
            JobState::Completed => match done_message(&state, &job).await {
                Ok(msg) => msg,
                Err(e) => error_payload(&e),
            },
            _ => failed_message(&job),
        };
        send_json(&tx, &terminal).await;
        drop(tx);
        let _ = send_task.await;
        return;
    }

    let job_id = job.id.clone();
    let mut bus_stream = match state.progress.subscribe(&job_id).await {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "failed to subscribe to progress bus");
            None
        }
    };

    let mut poll = interval(POLL_INTERVAL);
    let mut last_activity = std::time::Instant::now();
    let mut last_stage = job.stage;
    let mut last_scenes_completed = job.scenes_completed;

    loop {
        tokio::select! {
            event = async {
                match &mut bus_stream {
                    Some(s) => s.next().await,
                    None => std::future::pending().await,
                }
            } => {
                match event {
                    Some(envelope) => {
                        last_activity = std::time::Instant::now();
                        let msg_type = match &envelope.event {
                            ProgressEvent::Update { .. } => "update",
                            ProgressEvent::SceneReady { .. } => "scene_ready",
                            ProgressEvent::Error { .. } => "error",
                            ProgressEvent::Done { .. } => "done",
                        };
                        metrics::record_ws_message_sent("progress", msg_type);

                        let payload = match serde_json::to_value(&envelope.event) {
                            Ok(v) => v,
                            Err(_) => continue,
                        };

                        let terminal = envelope.event.is_terminal();
                        let payload = if terminal {
                            match state.jobs.get(&user.uid, &job_id).await {
                                Ok(Some(latest)) => done_message(&state, &latest).await.unwrap_or(payload),
                                _ => payload,
                            }
                        } else {
                            payload
                        };

                        if !send_json(&tx, &payload).await {
                            warn!(job_id = %job_id, "progress stream send failed, client disconnected");
                            break;
                        }

                        if terminal {
                            break;
                        }
                    }
                    None => {}
                }
            }
            _ = poll.tick() => {
                match state.jobs.get(&user.uid, &job_id).await {
                    Ok(Some(latest)) => {
                        if latest.state.is_terminal() || latest.state == JobState::Failed {
                            last_activity = std::time::Instant::now();
                            let terminal = match latest.state {
                                JobState::Completed => done_message(&state, &latest).await.unwrap_or_else(|e| error_payload(&e)),
                                _ => failed_message(&latest),
                            };
                            send_json(&tx, &terminal).await;
                            break;
                        }
                        if latest.stage != last_stage || latest.scenes_completed != last_scenes_completed {
                            last_activity = std::time::Instant::now();
                            last_stage = latest.stage;
                            last_scenes_completed = latest.scenes_completed;
                            let payload = serde_json::to_value(ProgressEvent::update(
                                latest.stage,
                                latest.scenes_completed,
                                latest.scenes_total,
                            ))
                            .unwrap_or_default();
                            metrics::record_ws_message_sent("progress", "update");
                            if !send_json(&tx, &payload).await {
                                break;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => warn!(job_id = %job_id, error = %e, "progress poll failed"),
                }

                if last_activity.elapsed() > IDLE_TIMEOUT {
                    info!(job_id = %job_id, "progress stream idle timeout");
                    break;
                }
            }
            client_msg = receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = std::time::Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(job_id = %job_id, "client closed progress stream");
                        break;
                    }
                    Some(Ok(Message::Text(_))) => {
                        metrics::record_ws_message_received("progress");
                    }
                    _ => {}
                }
            }
        }
    }

    drop(tx);
    let _ = send_task.await;
}
