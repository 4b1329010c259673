//! Per-owner Admission quota: tier-scaled, sliding
//! `RATE_LIMIT_WINDOW` (default 1 minute), in-memory with periodic sweep.
//!
//! Distinct from the edge-level IP/RPS limiter in `middleware.rs` — this one
//! gates `POST /generate` per owner account, not per connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::config::RateLimitTier;
use crate::error::ApiError;

/// How often a background sweep drops owners with no hits left in the
/// window, bounding memory for a long-lived process serving many owners.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

struct OwnerWindow {
    hits: Vec<Instant>,
}

#[derive(Clone)]
pub struct AdmissionGate {
    window: Duration,
    owners: Arc<RwLock<HashMap<String, OwnerWindow>>>,
}

pub struct AdmissionDecision {
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

impl AdmissionGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            owners: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Record one admission attempt for `owner_id` under `tier`. Rejects with
    /// `ApiError::RateLimited` once the tier's quota for the current window
    /// is exhausted.
    pub async fn check(&self, owner_id: &str, tier: RateLimitTier) -> Result<AdmissionDecision, ApiError> {
        let limit = tier.limit();
        let now = Instant::now();
        let mut owners = self.owners.write().await;
        let entry = owners.entry(owner_id.to_string()).or_insert_with(|| OwnerWindow { hits: Vec::new() });

        entry.hits.retain(|t| now.duration_since(*t) < self.window);

        if entry.hits.len() as u32 >= limit {
            let oldest = *entry.hits.first().expect("len >= limit > 0 implies non-empty");
            let reset = self.window.saturating_sub(now.duration_since(oldest));
            return Err(ApiError::RateLimited {
                limit,
                remaining: 0,
                reset_secs: reset.as_secs(),
            });
        }

        entry.hits.push(now);
        let remaining = limit - entry.hits.len() as u32;

        Ok(AdmissionDecision {
            limit,
            remaining,
            reset_secs: self.window.as_secs(),
        })
    }

    /// Drop owner windows with no remaining hits. Intended to be called
    /// periodically from a background task, not on the request path.
    pub async fn sweep(&self) {
        let now = Instant::now();
        let mut owners = self.owners.write().await;
        owners.retain(|_, w| {
            w.hits.retain(|t| now.duration_since(*t) < self.window);
            !w.hits.is_empty()
        });
    }

    pub fn sweep_interval() -> Duration {
        SWEEP_INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn eleventh_request_in_window_is_rate_limited() {
        let gate = AdmissionGate::new(Duration::from_secs(60));
        for _ in 0..10 {
            gate.check("owner-1", RateLimitTier::Free).await.unwrap();
        }
        let err = gate.check("owner-1", RateLimitTier::Free).await.unwrap_err();
        match err {
            ApiError::RateLimited { remaining, limit, .. } => {
                assert_eq!(remaining, 0);
                assert_eq!(limit, 10);
            }
            _ => panic!("expected RateLimited"),
        }
    }

    #[tokio::test]
    async fn distinct_owners_have_independent_quotas() {
        let gate = AdmissionGate::new(Duration::from_secs(60));
        for _ in 0..10 {
            gate.check("owner-a", RateLimitTier::Free).await.unwrap();
        }
        assert!(gate.check("owner-b", RateLimitTier::Free).await.is_ok());
    }
}
