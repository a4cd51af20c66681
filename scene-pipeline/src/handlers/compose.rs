use async_trait::async_trait;
use serde_json::Value;

use scene_core::JobType;
use scene_queue::{HandlerError, JobContext, JobHandler};

/// Scaffold composition pipeline. Implementations may drive the encoder
/// adapter per phase without changing this contract.
pub struct ComposeHandler;

impl ComposeHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ComposeHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobHandler for ComposeHandler {
    fn job_type(&self) -> JobType {
        JobType::Compose
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), HandlerError> {
        ctx.publish_progress(20, "assets").await;
        ctx.publish_progress(40, "transitions").await;
        ctx.publish_progress(60, "audio").await;
        ctx.publish_progress(80, "grading").await;

        ctx.publish_progress(100, "finalize").await;
        ctx.set_metadata(
            "output_url",
            Value::String(format!("/files/{}/composed.mp4", ctx.job_id)),
        );
        Ok(())
    }
}
