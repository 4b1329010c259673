//! The `ModelClient` trait every adapter implements, and the shared
//! `poll_until` helper that gives every call path uniform cancellation and
//! backoff.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ModelClientError;
use crate::types::{BackoffPolicy, Handle, PollOutcome, PollPolicy};

/// A generative-provider adapter following the uniform `Start`/`Poll`
/// contract: `Request` is whatever that provider needs
/// to begin generating, `Artifact` is what it hands back once done.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    type Request: Send + Sync;
    type Artifact: Send + Sync;

    /// Human-readable adapter name, used in logs/error messages.
    fn name(&self) -> &'static str;

    async fn start(&self, request: Self::Request) -> Result<Handle, ModelClientError>;

    async fn poll(&self, handle: &Handle) -> Result<PollOutcome<Self::Artifact>, ModelClientError>;
}

/// Run `operation` with capped exponential backoff, retrying only
/// `ModelClientError::Transient` failures. Used to wrap both `start` and
/// each individual `poll` call.
pub async fn with_backoff<F, Fut, T>(
    operation_name: &str,
    policy: BackoffPolicy,
    mut operation: F,
) -> Result<T, ModelClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelClientError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                attempt += 1;
                warn!(operation = operation_name, attempt, ?delay, error = %e, "transient provider error, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Poll `client` for `handle` every `policy.interval` until it reaches a
/// terminal state, `policy.max_attempts` is exhausted (`ErrTimeout`), or
/// `cancel` fires (`ErrCanceled`). Every poll is individually wrapped in
/// `with_backoff` so a single flaky network call doesn't fail the whole
/// scene.
pub async fn poll_until<C: ModelClient>(
    client: &C,
    handle: &Handle,
    policy: PollPolicy,
) -> Result<C::Artifact, ModelClientError> {
    poll_until_cancelable(client, handle, policy, &CancellationToken::new()).await
}

pub async fn poll_until_cancelable<C: ModelClient>(
    client: &C,
    handle: &Handle,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<C::Artifact, ModelClientError> {
    for attempt in 0..policy.max_attempts {
        if cancel.is_cancelled() {
            return Err(ModelClientError::Canceled);
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ModelClientError::Canceled),
            result = with_backoff(client.name(), BackoffPolicy::default(), || client.poll(handle)) => result?,
        };

        match outcome {
            PollOutcome::Ready(artifact) => return Ok(artifact),
            PollOutcome::Failed(reason) => return Err(ModelClientError::GenerationFailed(reason)),
            PollOutcome::Pending => {
                debug!(adapter = client.name(), %handle, attempt, "poll pending");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ModelClientError::Canceled),
                    _ = tokio::time::sleep(policy.interval) => {}
                }
            }
        }
    }

    Err(ModelClientError::PollTimeout(policy.max_attempts))
}
