use async_trait::async_trait;
use serde_json::Value;

use scene_core::JobType;
use scene_queue::{HandlerError, JobContext, JobHandler};

/// Scaffold text-to-speech pipeline
pub struct TtsHandler;

/// Speech rate used for the duration estimate, characters per second
const CHARS_PER_SECOND: usize = 150;

impl TtsHandler {
    pub fn new() -> Self {
        Self
    }

    /// Estimated clip length; even empty text yields at least one second
    fn estimated_duration_secs(text: &str) -> u64 {
        ((text.len() / CHARS_PER_SECOND) as u64).max(1)
    }
}

impl Default for TtsHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for TtsHandler {
    fn job_type(&self) -> JobType {
        JobType::Tts
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), HandlerError> {
        let text = ctx.request_str("text").unwrap_or("").to_string();

        ctx.publish_progress(30, "converting").await;
        ctx.publish_progress(80, "optimizing").await;

        ctx.publish_progress(100, "finalize").await;
        ctx.set_metadata(
            "estimated_duration_sec",
            Value::from(Self::estimated_duration_secs(&text)),
        );
        ctx.set_metadata(
            "audio_url",
            Value::String(format!("/files/{}/speech.wav", ctx.job_id)),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_still_estimates_one_second() {
        assert_eq!(TtsHandler::estimated_duration_secs(""), 1);
    }

    #[test]
    fn long_text_scales_linearly() {
        let text = "a".repeat(450);
        assert_eq!(TtsHandler::estimated_duration_secs(&text), 3);
        assert_eq!(TtsHandler::estimated_duration_secs(&"b".repeat(149)), 1);
    }
}
