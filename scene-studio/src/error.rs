use thiserror::Error;

use scene_credits::LedgerError;
use scene_queue::DispatchError;
use scene_store::StoreError;

/// Result type for the submission surface
pub type StudioResult<T> = Result<T, SubmitError>;

/// Errors surfaced to the HTTP layer. Everything after enqueue is observed
/// only through job status, never through this type.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("unknown video model: {0}")]
    UnknownModel(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for SubmitError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits => Self::InsufficientCredits,
            other => Self::Ledger(other),
        }
    }
}

impl From<DispatchError> for SubmitError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::JobNotFound(id) => Self::JobNotFound(id),
            DispatchError::Store(e) => Self::Store(e),
            DispatchError::Ledger(e) => e.into(),
        }
    }
}
