//! Shared reqwest-based transport for the four provider adapters: a single
//! place that knows how to turn a `reqwest` failure into the
//! transient-vs-permanent distinction `poll_until`'s backoff depends on.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ModelClientError;

/// Thin, provider-agnostic HTTP client: base URL + bearer credential +
/// request timeout. Each adapter (`ScriptClient`, `SceneVideoClient`, ...)
/// wraps one of these and adds its own request/response shapes.
#[derive(Clone)]
pub struct ProviderHttpClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl ProviderHttpClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client builds with static config"),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ModelClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        decode(response).await
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ModelClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(classify_transport_error)?;

        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, ModelClientError> {
    let status = response.status();
    if status.is_success() {
        response
            .json::<R>()
            .await
            .map_err(|e| ModelClientError::InvalidResponse(e.to_string()))
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(classify_status_error(status, body))
    }
}

fn classify_transport_error(err: reqwest::Error) -> ModelClientError {
    // Connection-level failures (timeout, refused, DNS) are always worth a
    // retry; reqwest never raises a non-transient error at this layer, the
    // provider's status code is what decides permanence (see `decode`).
    ModelClientError::Transient(err.to_string())
}

fn classify_status_error(status: StatusCode, body: String) -> ModelClientError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ModelClientError::Transient(format!("{status}: {body}"))
    } else {
        ModelClientError::Rejected(format!("{status}: {body}"))
    }
}
