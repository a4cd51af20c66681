use thiserror::Error;

/// Result type for dispatcher operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Infrastructure errors from the orchestration layer
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] scene_store::StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] scene_credits::LedgerError),
}

/// Handler outcome for a single run - determines retry behavior.
///
/// Handlers report failure as an explicit value; the worker owns the
/// terminal state write and the refund, so no exception-style control flow
/// crosses this boundary.
#[derive(Error, Debug, Clone)]
pub enum HandlerError {
    /// Transient failure - eligible for another run if the job has retry budget
    #[error("retryable error: {0}")]
    Retryable(String),

    /// Permanent failure - job goes straight to `error`
    #[error("permanent error: {0}")]
    Permanent(String),
}

impl HandlerError {
    pub fn retryable(msg: impl Into<String>) -> Self {
        Self::Retryable(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    /// The message shown to clients through the status API
    pub fn message(&self) -> &str {
        match self {
            Self::Retryable(msg) | Self::Permanent(msg) => msg,
        }
    }
}
