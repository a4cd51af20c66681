use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure errors from the persistence layer.
///
/// "Not found" is not an error: lookups return `Option` so callers can
/// distinguish a missing row from a failing database.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row for {entity} {key}: {detail}")]
    CorruptRow {
        entity: &'static str,
        key: String,
        detail: String,
    },
}

impl StoreError {
    pub(crate) fn corrupt(entity: &'static str, key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::CorruptRow {
            entity,
            key: key.into(),
            detail: detail.into(),
        }
    }
}
