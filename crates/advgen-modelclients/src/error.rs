//! Error taxonomy for generative-provider adapters.

use thiserror::Error;

pub type ModelClientResult<T> = Result<T, ModelClientError>;

#[derive(Debug, Error)]
pub enum ModelClientError {
    /// The provider rejected the request outright (bad prompt, unsupported
    /// duration, auth failure past retry). Maps to `ErrProvider` and is
    /// fatal for the stage — the Orchestrator does not retry these.
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// The provider reported the generation itself failed (e.g. content
    /// policy, internal error) after it had been accepted. Maps to
    /// `ErrProvider`.
    #[error("provider generation failed: {0}")]
    GenerationFailed(String),

    /// A transient network/5xx error talking to the provider. Retried with
    /// capped exponential backoff by `poll_until`/`start_with_retry`; only
    /// surfaces to the caller once the retry budget is exhausted.
    #[error("transient provider error: {0}")]
    Transient(String),

    /// `MAX_ATTEMPTS` polls elapsed without the provider reaching a
    /// terminal state. Maps to `ErrTimeout`.
    #[error("polling timed out after {0} attempts")]
    PollTimeout(u32),

    /// The caller's cancellation token fired mid-poll. Maps to `ErrCanceled`.
    #[error("canceled")]
    Canceled,

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),
}

impl ModelClientError {
    /// Transient network/backend errors are retried locally; everything
    /// else (content rejected, generation failed, timeout, cancellation)
    /// is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, ModelClientError::Transient(_))
    }
}
