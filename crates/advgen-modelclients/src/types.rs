//! Shared `Start`/`Poll` contract types and the async-polling helpers used
//! to drive long-running generative provider calls.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Opaque handle returned by a provider's `Start` call, passed back into
/// every subsequent `Poll`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle(pub String);

impl Handle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The result of a single `Poll` call.
#[derive(Debug, Clone)]
pub enum PollOutcome<A> {
    /// Still generating; call `Poll` again after `POLL_INTERVAL`.
    Pending,
    /// Generation finished; the artifact is attached.
    Ready(A),
    /// The provider reported a terminal failure for this handle.
    Failed(String),
}

/// Polling cadence/timeout policy for `poll_until`, matching the documented
/// `POLL_INTERVAL`/`MAX_ATTEMPTS` and the per-stage wall clocks in §5.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    /// The default used for scene-video polling: 5s interval, 120 attempts
    /// (a 10 minute wall cap per scene).
    pub const DEFAULT: PollPolicy = PollPolicy {
        interval: Duration::from_secs(5),
        max_attempts: 120,
    };

    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, max_attempts }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Capped exponential backoff policy for transient network errors hit
/// mid-poll ("initial 100ms, multiplier 2, max 5s, 3
/// attempts").
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: u32,
    pub max: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub const DEFAULT: BackoffPolicy = BackoffPolicy {
        initial: Duration::from_millis(100),
        multiplier: 2,
        max: Duration::from_secs(5),
        max_attempts: 3,
    };

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.initial.saturating_mul(self.multiplier.saturating_pow(attempt));
        scaled.min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}
