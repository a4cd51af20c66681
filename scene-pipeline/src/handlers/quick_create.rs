use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use scene_core::{JobType, Render, RenderQuality, RenderStatus};
use scene_queue::{HandlerError, JobContext, JobHandler};
use scene_store::RenderStore;

use crate::adapters::download::Downloader;
use crate::handlers::duration_label_secs;

/// Scaffold pipeline: walks the phase contract and tracks one render row
/// per scene without calling external providers.
pub struct QuickCreateHandler {
    renders: RenderStore,
}

impl QuickCreateHandler {
    pub fn new(renders: RenderStore) -> Self {
        Self { renders }
    }

    /// Scene count scales with the requested duration, at least three
    fn scene_count(duration_label: &str) -> u32 {
        (duration_label_secs(duration_label) / 10).max(3)
    }
}

#[async_trait]
impl JobHandler for QuickCreateHandler {
    fn job_type(&self) -> JobType {
        JobType::QuickCreate
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), HandlerError> {
        let duration = ctx.request_str("duration").unwrap_or("30s").to_string();
        let scenes = Self::scene_count(&duration);

        ctx.publish_progress(10, "script").await;
        ctx.publish_progress(30, "scenes").await;

        ctx.publish_progress(60, "render").await;
        for index in 1..=scenes {
            let item_id = format!("scene_{index:03}");
            let scene_url = format!("/files/{}/{item_id}.mp4", ctx.job_id);
            let row = Render {
                job_id: ctx.job_id.as_str().to_string(),
                item_id: item_id.clone(),
                hash: Downloader::content_hash(&format!("{}/{item_id}", ctx.job_id)),
                quality: RenderQuality::High,
                url: Some(scene_url),
                status: RenderStatus::Completed,
                created_at: None,
                updated_at: None,
            };
            if let Err(e) = self.renders.upsert(&row).await {
                warn!(job_id = %ctx.job_id, item_id, error = %e, "scene render write failed");
            }
        }

        ctx.publish_progress(90, "audio").await;

        ctx.publish_progress(100, "finalize").await;
        ctx.set_metadata(
            "output_url",
            Value::String(format!("/files/{}/output.mp4", ctx.job_id)),
        );
        ctx.set_metadata("scene_count", Value::from(scenes));
        Ok(())
    }
}
