use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use scene_core::{short_id, JobType, ModelRegistry, Render, RenderQuality, RenderStatus};
use scene_queue::{HandlerError, JobContext, JobHandler};
use scene_store::RenderStore;

use crate::adapters::download::Downloader;
use crate::adapters::encoder::Encoder;
use crate::adapters::image::ImageClient;
use crate::adapters::video::{VideoClient, VideoRequest};
use crate::handlers::dimensions_for;

/// The principal pipeline: concept image, aspect normalization, video
/// generation, soundtrack mix, finalize.
///
/// Provider trouble never fails the job: a missing concept image becomes a
/// solid-color placeholder, a missing clip becomes an image loop, a missing
/// soundtrack is skipped. Only local encoder failures are fatal.
pub struct FullUniverseHandler {
    image: ImageClient,
    video: VideoClient,
    encoder: Encoder,
    downloader: Downloader,
    renders: RenderStore,
    models: ModelRegistry,
}

/// Baseline clip length requested from providers, kept minimal for cost
const BASELINE_CLIP_SECS: u32 = 5;
/// Length of the image-loop fallback video
const FALLBACK_LOOP_SECS: u32 = 30;

const OUTPUT_FILE: &str = "universe_complete.mp4";
const CONCEPT_FILE: &str = "concept.jpg";
const CONCEPT_CROPPED_FILE: &str = "concept_cropped.jpg";
const SOUNDTRACK_FILE: &str = "soundtrack.mp3";

impl FullUniverseHandler {
    pub fn new(
        image: ImageClient,
        video: VideoClient,
        encoder: Encoder,
        downloader: Downloader,
        renders: RenderStore,
        models: ModelRegistry,
    ) -> Self {
        Self {
            image,
            video,
            encoder,
            downloader,
            renders,
            models,
        }
    }

    /// Phase 1: concept image from the provider, or a placeholder frame
    async fn concept_image(
        &self,
        ctx: &JobContext,
        prompt: &str,
        size: (u32, u32),
        concept_path: &PathBuf,
    ) -> Result<Option<String>, HandlerError> {
        if let Some(url) = self.image.generate(prompt, size.0, size.1).await {
            match self.downloader.fetch_to_file(&url, concept_path).await {
                Ok(_) => return Ok(Some(url)),
                Err(e) => warn!(job_id = %ctx.job_id, error = %e, "concept download failed, using placeholder"),
            }
        } else {
            warn!(job_id = %ctx.job_id, "image provider could not produce, using placeholder");
        }

        self.encoder
            .make_solid_color_image(size, concept_path)
            .await?;
        Ok(None)
    }

    /// Phase 2: force vertical output to exactly 720x1280 by center-cropping
    /// a scaled copy; afterwards the local file is authoritative
    async fn normalize_aspect(
        &self,
        ctx: &JobContext,
        size: (u32, u32),
        concept_path: &PathBuf,
        image_url: Option<String>,
    ) -> Option<String> {
        let cropped = concept_path.with_file_name(CONCEPT_CROPPED_FILE);
        match self.encoder.crop_to_size(concept_path, size, &cropped).await {
            Ok(()) => match tokio::fs::rename(&cropped, concept_path).await {
                Ok(()) => Some(
                    ctx.settings
                        .public_file_url(ctx.job_id.as_str(), CONCEPT_FILE),
                ),
                Err(e) => {
                    warn!(job_id = %ctx.job_id, error = %e, "crop replace failed, keeping provider image");
                    image_url
                }
            },
            Err(e) => {
                warn!(job_id = %ctx.job_id, error = %e, "aspect crop failed, keeping provider image");
                image_url
            }
        }
    }
}

#[async_trait]
impl JobHandler for FullUniverseHandler {
    fn job_type(&self) -> JobType {
        JobType::QuickCreateFullUniverse
    }

    async fn run(&self, ctx: &JobContext) -> Result<(), HandlerError> {
        let idea_text = ctx
            .request_str("idea_text")
            .ok_or_else(|| HandlerError::permanent("payload is missing idea_text"))?
            .to_string();
        let style_key = ctx.request_str("style_key").unwrap_or("cinematic_realism").to_string();
        let override_model = ctx.request_str("video_model").map(str::to_string);
        let video_duration = ctx.request_u64("video_duration").unwrap_or(5) as u32;
        let video_quality = ctx.request_str("video_quality").unwrap_or("720p").to_string();
        let aspect_ratio = ctx.request_str("aspect_ratio").unwrap_or("9:16").to_string();

        // Sibling identities: prefer the ones minted at submission so the
        // client's receipt matches the finished metadata.
        let episode_id = ctx
            .request_str("episode_id")
            .map(str::to_string)
            .unwrap_or_else(|| short_id(8));
        let series_id = ctx
            .request_str("series_id")
            .map(str::to_string)
            .unwrap_or_else(|| short_id(8));
        let character_id = ctx
            .request_str("character_id")
            .map(str::to_string)
            .unwrap_or_else(|| short_id(8));

        let size = dimensions_for(&aspect_ratio);
        let model = self.models.resolve(&style_key, override_model.as_deref());
        ctx.set_metadata("video_model", Value::String(model.id.clone()));
        ctx.set_metadata(
            "dimensions",
            Value::String(format!("{}x{}", size.0, size.1)),
        );
        ctx.set_metadata("aspect_ratio", Value::String(aspect_ratio.clone()));

        let job_dir = ctx.settings.job_dir(ctx.job_id.as_str());
        tokio::fs::create_dir_all(&job_dir)
            .await
            .map_err(|e| HandlerError::permanent(format!("cannot create job dir: {e}")))?;

        let quality = if video_quality == "1080p" {
            RenderQuality::Ultra
        } else {
            RenderQuality::High
        };
        let track_render = self
            .renders
            .upsert(&Render {
                job_id: ctx.job_id.as_str().to_string(),
                item_id: "universe_complete".to_string(),
                hash: Downloader::content_hash(ctx.job_id.as_str()),
                quality,
                url: None,
                status: RenderStatus::Processing,
                created_at: None,
                updated_at: None,
            })
            .await;
        if let Err(e) = track_render {
            warn!(job_id = %ctx.job_id, error = %e, "render row write failed");
        }

        // Phase 1: concept image.
        ctx.publish_progress(10, "dreaming concept").await;
        let concept_path = job_dir.join(CONCEPT_FILE);
        let image_prompt = format!("Cinematic shot, masterpiece: {idea_text}");
        let mut image_url = self
            .concept_image(ctx, &image_prompt, size, &concept_path)
            .await?;

        // Phase 2: aspect normalization (vertical output only).
        if aspect_ratio == "9:16" {
            image_url = self.normalize_aspect(ctx, size, &concept_path, image_url).await;
        }

        // Phase 3: video generation with image-loop fallback.
        ctx.publish_progress(50, "generating video").await;
        let output_path = job_dir.join(OUTPUT_FILE);
        let clip_secs = model.clamp_duration(video_duration.min(BASELINE_CLIP_SECS));
        let mut video_source = "image_loop_fallback";

        if model.supports_image_to_video {
            let request = VideoRequest {
                prompt: format!("Cinematic motion, slow camera movement: {idea_text}"),
                duration_secs: clip_secs,
                quality: video_quality.clone(),
                aspect_ratio: aspect_ratio.clone(),
                image_url: image_url.clone(),
                negative_prompt: Some(scene_core::get_style(&style_key).negative.clone()),
                seed: None,
            };
            if let Some(url) = self.video.generate(model, &request).await {
                match self.downloader.fetch_to_file(&url, &output_path).await {
                    Ok(_) => video_source = "ai_generated",
                    Err(e) => {
                        warn!(job_id = %ctx.job_id, error = %e, "video download failed, falling back to image loop")
                    }
                }
            }
        } else {
            info!(job_id = %ctx.job_id, model = %model.id, "model is text-to-video only, using image loop");
        }

        if video_source == "image_loop_fallback" {
            self.encoder
                .loop_image_to_video(&concept_path, size, FALLBACK_LOOP_SECS, &output_path)
                .await?;
        }
        ctx.set_metadata("video_source", Value::String(video_source.to_string()));

        // Phase 4: soundtrack; every failure here is non-fatal.
        ctx.publish_progress(80, "adding soundtrack").await;
        let soundtrack_url = ctx.settings.soundtrack_for(&style_key).to_string();
        let soundtrack_path = job_dir.join(SOUNDTRACK_FILE);
        match self.downloader.fetch_to_file(&soundtrack_url, &soundtrack_path).await {
            Ok(_) => {
                let muxed = job_dir.join("universe_with_audio.mp4");
                match self.encoder.mux_audio(&output_path, &soundtrack_path, &muxed).await {
                    Ok(()) => {
                        if let Err(e) = tokio::fs::rename(&muxed, &output_path).await {
                            warn!(job_id = %ctx.job_id, error = %e, "audio replace failed, keeping silent video");
                        }
                    }
                    Err(e) => warn!(job_id = %ctx.job_id, error = %e, "audio mux failed, keeping silent video"),
                }
            }
            Err(e) => warn!(job_id = %ctx.job_id, error = %e, "soundtrack download failed, skipping audio"),
        }

        // Phase 5: finalize.
        ctx.publish_progress(100, "finalize").await;
        let output_url = format!("/files/{}/{}", ctx.job_id, OUTPUT_FILE);
        ctx.set_metadata("output_url", Value::String(output_url.clone()));
        ctx.set_metadata("episode_id", Value::String(episode_id.clone()));
        ctx.set_metadata("series_id", Value::String(series_id));
        ctx.set_metadata("character_id", Value::String(character_id));
        ctx.set_metadata(
            "episode_json_url",
            Value::String(format!("/files/{}/episode_{episode_id}.json", ctx.job_id)),
        );
        ctx.set_metadata(
            "universe_json_url",
            Value::String(format!("/files/{}/universe.json", ctx.job_id)),
        );

        if let Err(e) = self
            .renders
            .update_status(ctx.job_id.as_str(), "universe_complete", RenderStatus::Completed)
            .await
        {
            warn!(job_id = %ctx.job_id, error = %e, "render status write failed");
        }
        if let Err(e) = self
            .renders
            .update_url(ctx.job_id.as_str(), "universe_complete", &output_url)
            .await
        {
            warn!(job_id = %ctx.job_id, error = %e, "render url write failed");
        }

        info!(job_id = %ctx.job_id, video_source, "universe pipeline finished");
        Ok(())
    }
}
