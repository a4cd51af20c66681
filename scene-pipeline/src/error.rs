use thiserror::Error;

use scene_queue::HandlerError;

/// Result type for encoder and download primitives
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures from the local side of the pipeline. Provider adapters do not
/// use this type: they are failure-tolerant and signal "could not produce"
/// with `None`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("ffmpeg not found: {0}")]
    EncoderMissing(String),

    #[error("encoder failed ({command}): {stderr}")]
    Encoder { command: String, stderr: String },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for HandlerError {
    fn from(err: PipelineError) -> Self {
        HandlerError::permanent(err.to_string())
    }
}
