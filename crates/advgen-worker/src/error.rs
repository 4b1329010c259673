//! Orchestrator error taxonomy, the subset of the wider
//! error taxonomy that originates in the worker binary.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// A generative-provider call failed after exhausting retries.
    #[error("provider error: {0}")]
    Provider(String),

    /// The Composer subprocess exited non-zero or produced no output file.
    #[error("composition error: {0}")]
    Composition(String),

    /// An input to the Composer had a corrupt or missing stream.
    #[error("invalid media: {0}")]
    InvalidMedia(String),

    /// A backend (JobStore/AssetStore) call failed after local retries.
    #[error("storage error: {0}")]
    Storage(#[from] advgen_storage::StorageError),

    #[error("jobstore error: {0}")]
    JobStore(#[from] advgen_jobstore::FirestoreError),

    #[error("media error: {0}")]
    Media(#[from] advgen_media::MediaError),

    #[error("queue error: {0}")]
    Queue(#[from] advgen_queue::QueueError),

    /// Cooperative cancellation, either stage timeout or external request.
    #[error("canceled: {0}")]
    Canceled(String),

    /// A stage wall-clock deadline elapsed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A script generation response did not satisfy the deterministic
    /// scene-count/duration-sum contract, even after one repair attempt.
    #[error("script invalid: {0}")]
    ScriptInvalid(String),

    /// A Job carries an active, unexpired worker lease held by another
    /// worker; this worker may not operate on it.
    #[error("lease conflict: {0}")]
    LeaseConflict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    pub fn invalid_media(msg: impl Into<String>) -> Self {
        Self::InvalidMedia(msg.into())
    }

    pub fn canceled(msg: impl Into<String>) -> Self {
        Self::Canceled(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn script_invalid(msg: impl Into<String>) -> Self {
        Self::ScriptInvalid(msg.into())
    }

    pub fn lease_conflict(msg: impl Into<String>) -> Self {
        Self::LeaseConflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error should be retried locally (capped exponential
    /// backoff, 3 attempts per §7) before being surfaced as a fatal job
    /// error. Mirrors `FirestoreError::is_retryable`/`QueueError`'s
    /// transient-vs-fatal split one layer up.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerError::Storage(_) | WorkerError::JobStore(_) | WorkerError::Queue(_) | WorkerError::Io(_)
        )
    }

    /// Whether the job this error occurred in must transition to `failed`
    /// rather than being retried by the caller.
    pub fn is_fatal_for_job(&self) -> bool {
        matches!(
            self,
            WorkerError::Provider(_)
                | WorkerError::Composition(_)
                | WorkerError::InvalidMedia(_)
                | WorkerError::Canceled(_)
                | WorkerError::Timeout(_)
                | WorkerError::ScriptInvalid(_)
        )
    }

    pub fn is_lease_conflict(&self) -> bool {
        matches!(self, WorkerError::LeaseConflict(_))
    }
}
