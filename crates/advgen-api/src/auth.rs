//! Bearer-token authentication against a Firebase-style identity provider,
//! verified locally against its published JWKS rather than by a round-trip
//! per request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::RateLimitTier;
use crate::error::ApiError;
use crate::state::AppState;

const GOOGLE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";
const JWKS_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: Option<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Custom claim carrying the account's Admission tier; set by whatever
    /// issues tokens for this deployment. Absent for most providers, in
    /// which case the caller is treated as `free`.
    #[serde(default)]
    pub tier: Option<String>,
}

/// The authenticated caller. `uid` is the owner id every Job, scene, and
/// asset key is scoped to.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub tier: RateLimitTier,
}

impl From<IdentityClaims> for AuthUser {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            tier: claims
                .tier
                .as_deref()
                .map(RateLimitTier::from_str)
                .unwrap_or(RateLimitTier::Free),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<JwkKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwkKey {
    kid: String,
    n: String,
    e: String,
}

/// Cached decoding keys for the configured identity provider, refreshed at
/// most once per `JWKS_CACHE_TTL`.
pub struct JwksCache {
    http: Client,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_refresh: RwLock<Instant>,
    project_id: String,
}

impl JwksCache {
    pub async fn new() -> anyhow::Result<Self> {
        let project_id =
            std::env::var("GCP_PROJECT_ID").or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))?;

        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        let cache = Self {
            http,
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(Instant::now() - JWKS_CACHE_TTL),
            project_id,
        };

        cache.refresh_keys().await?;
        Ok(cache)
    }

    async fn refresh_keys(&self) -> anyhow::Result<()> {
        debug!("refreshing JWKS keys");

        let response = self.http.get(GOOGLE_JWKS_URL).send().await?;
        let jwks: JwksResponse = response.json().await?;

        let mut keys = HashMap::new();
        for jwk in jwks.keys {
            let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)?;
            keys.insert(jwk.kid, key);
        }

        let key_count = keys.len();
        *self.keys.write().await = keys;
        *self.last_refresh.write().await = Instant::now();

        debug!(key_count, "refreshed JWKS keys");
        Ok(())
    }

    async fn get_key(&self, kid: &str) -> Option<DecodingKey> {
        let needs_refresh = self.last_refresh.read().await.elapsed() > JWKS_CACHE_TTL;
        if needs_refresh {
            if let Err(e) = self.refresh_keys().await {
                warn!(error = %e, "failed to refresh JWKS keys");
            }
        }

        self.keys.read().await.get(kid).cloned()
    }

    pub async fn verify_token(&self, token: &str) -> Result<IdentityClaims, ApiError> {
        let header =
            decode_header(token).map_err(|e| ApiError::unauthorized(format!("invalid token header: {e}")))?;

        let kid = header.kid.ok_or_else(|| ApiError::unauthorized("token missing key id"))?;

        let key = self
            .get_key(&kid)
            .await
            .ok_or_else(|| ApiError::unauthorized("unknown key id"))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[format!("{FIREBASE_ISSUER_PREFIX}{}", self.project_id)]);
        validation.set_audience(&[&self.project_id]);

        let token_data = decode::<IdentityClaims>(token, &key, &validation)
            .map_err(|e| ApiError::unauthorized(format!("token validation failed: {e}")))?;

        Ok(token_data.claims)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("invalid Authorization header format"))?;

        let claims = state.jwks.verify_token(token).await?;
        Ok(AuthUser::from(claims))
    }
}
