//! Presigned direct-upload handler for product images used in compliance
//! (side-effects disclosure) jobs.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// How long the presigned PUT URL stays valid.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(900);
/// How long the asset's presigned GET URL, handed back alongside the PUT
/// URL, stays valid once the caller has uploaded to it.
const ASSET_URL_TTL: Duration = Duration::from_secs(3600);

const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

#[derive(Debug, Deserialize)]
pub struct PresignedUploadQuery {
    #[serde(rename = "type")]
    pub asset_type: String,
}

#[derive(Debug, Deserialize)]
pub struct PresignedUploadRequest {
    pub filename: String,
    pub content_type: String,
    pub file_size: u64,
}

#[derive(Debug, Serialize)]
pub struct PresignedUploadResponse {
    pub upload_url: String,
    pub asset_url: String,
    pub asset_key: String,
}

/// `POST /upload/presigned-url?type=product_image`
pub async fn create_presigned_upload(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PresignedUploadQuery>,
    Json(req): Json<PresignedUploadRequest>,
) -> ApiResult<Json<PresignedUploadResponse>> {
    if query.asset_type != "product_image" {
        return Err(ApiError::validation(format!(
            "unsupported upload type '{}'",
            query.asset_type
        )));
    }

    if req.file_size == 0 || req.file_size > state.config.max_upload_size as u64 {
        return Err(ApiError::validation(format!(
            "file_size must be 1-{} bytes",
            state.config.max_upload_size
        )));
    }

    if !ALLOWED_CONTENT_TYPES.contains(&req.content_type.as_str()) {
        return Err(ApiError::validation(format!(
            "unsupported content_type '{}', expected one of {:?}",
            req.content_type, ALLOWED_CONTENT_TYPES
        )));
    }

    let safe_filename = sanitize_filename(&req.filename);
    let asset_key = format!("uploads/{}/{}-{}", user.uid, uuid::Uuid::new_v4(), safe_filename);

    let upload_url = state
        .storage
        .presign_put(&asset_key, &req.content_type, UPLOAD_URL_TTL)
        .await?;
    let asset_url = state.storage.presign_get(&asset_key, ASSET_URL_TTL).await?;

    Ok(Json(PresignedUploadResponse {
        upload_url,
        asset_url,
        asset_key,
    }))
}

/// Strip path separators and anything but a conservative filename charset so
/// a crafted `filename` can't escape the `uploads/{owner}/` prefix.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_strips_path() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
    }

    #[test]
    fn test_sanitize_filename_keeps_safe_name() {
        assert_eq!(sanitize_filename("product-shot_01.png"), "product-shot_01.png");
    }

    #[test]
    fn test_sanitize_filename_empty_falls_back() {
        assert_eq!(sanitize_filename("///"), "upload");
    }
}
