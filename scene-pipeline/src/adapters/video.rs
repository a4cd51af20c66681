use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use scene_core::{Settings, VideoModel};

use super::{PollOutcome, PollPolicy};

const RUNWAY: &str = "runway-gen3";
const VEO: &str = "veo3";
const SORA: &str = "sora-2-pro-text-to-video";
const KLING: &str = "kling/v2-1-pro";
const HAILUO: &str = "hailuo/2-3-image-to-video-pro";
const BYTEDANCE: &str = "bytedance/v1-pro-text-to-video";
const WAN_TURBO: &str = "wan/2-2-a14b-text-to-video-turbo";
const WAN_26: &str = "wan/2-6-text-to-video";

/// Neutral call signature for video generation; the adapter does the
/// provider-specific mapping (aspect labels, duration vs. frames, `768P`).
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    pub duration_secs: u32,
    pub quality: String,
    pub aspect_ratio: String,
    pub image_url: Option<String>,
    pub negative_prompt: Option<String>,
    pub seed: Option<u64>,
}

/// Adapter for the unified multi-model video-generation API
pub struct VideoClient {
    http: Client,
    api_key: String,
    base_url: String,
    poll: PollPolicy,
}

impl VideoClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            http: Client::new(),
            api_key: settings.kie_api_key.clone(),
            base_url: settings.kie_base_url.clone(),
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Generate a clip, returning its URL or `None` when the provider could
    /// not produce one
    pub async fn generate(&self, model: &VideoModel, request: &VideoRequest) -> Option<String> {
        if self.api_key.len() < 10 {
            warn!("video provider key not configured, skipping generation");
            return None;
        }

        let (path, payload) = build_payload(&model.id, request);
        info!(
            model = %model.display_name,
            duration = request.duration_secs,
            quality = %request.quality,
            aspect = %request.aspect_ratio,
            "requesting video generation"
        );

        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "video request rejected");
            return None;
        }
        let body: Value = response.json().await.ok()?;
        let task_id = body
            .get("data")
            .and_then(|d| d.get("taskId"))
            .and_then(Value::as_str)?
            .to_string();

        debug!(task_id, "video task created, polling");
        self.poll_result(&model.id, &task_id).await
    }

    async fn poll_result(&self, model_id: &str, task_id: &str) -> Option<String> {
        let path = poll_path(model_id);
        for attempt in 0..self.poll.max_attempts {
            tokio::time::sleep(self.poll.interval).await;
            debug!(attempt, task_id, "polling video task");

            let response = self
                .http
                .get(format!("{}{path}", self.base_url))
                .query(&[("taskId", task_id)])
                .bearer_auth(&self.api_key)
                .send()
                .await;
            let Ok(response) = response else {
                continue;
            };
            if !response.status().is_success() {
                continue;
            }
            let Ok(body) = response.json::<Value>().await else {
                continue;
            };

            match extract_video_result(model_id, &body) {
                PollOutcome::Ready(url) => {
                    info!(url, "video ready");
                    return Some(url);
                }
                PollOutcome::Failed => {
                    warn!(task_id, "video generation failed");
                    return None;
                }
                PollOutcome::Pending => {}
            }
        }
        warn!(task_id, "video generation timed out");
        None
    }
}

/// Provider endpoint plus request body for one model family
pub fn build_payload(model_id: &str, request: &VideoRequest) -> (&'static str, Value) {
    match model_id {
        RUNWAY => {
            let mut payload = json!({
                "prompt": request.prompt,
                "duration": request.duration_secs.min(10),
                "quality": request.quality,
                "aspectRatio": request.aspect_ratio,
                "waterMark": "",
            });
            if let Some(url) = &request.image_url {
                payload["imageUrl"] = Value::String(url.clone());
            }
            ("/api/v1/runway/generate", payload)
        }
        VEO => {
            let mut payload = json!({
                "prompt": request.prompt,
                "model": "veo3",
                "aspectRatio": request.aspect_ratio,
            });
            if let Some(url) = &request.image_url {
                payload["imageUrls"] = json!([url]);
            }
            ("/api/v1/veo/generate", payload)
        }
        _ => (
            "/api/v1/jobs/createTask",
            json!({
                "model": model_id,
                "input": market_input(model_id, request),
            }),
        ),
    }
}

/// Input document for the market (`createTask`) API family
fn market_input(model_id: &str, request: &VideoRequest) -> Value {
    let mut input = Map::new();
    input.insert("prompt".to_string(), Value::String(request.prompt.clone()));

    match model_id {
        SORA => {
            let aspect = match request.aspect_ratio.as_str() {
                "9:16" => "portrait",
                "1:1" => "square",
                _ => "landscape",
            };
            input.insert("aspect_ratio".to_string(), Value::String(aspect.to_string()));
            input.insert(
                "n_frames".to_string(),
                Value::String((request.duration_secs * 2).min(20).to_string()),
            );
            let size = if matches!(request.quality.as_str(), "1080p" | "high") {
                "high"
            } else {
                "medium"
            };
            input.insert("size".to_string(), Value::String(size.to_string()));
            input.insert("remove_watermark".to_string(), Value::Bool(true));
        }
        KLING => {
            input.insert(
                "duration".to_string(),
                Value::String(request.duration_secs.min(10).to_string()),
            );
            if let Some(negative) = &request.negative_prompt {
                if !negative.is_empty() {
                    input.insert("negative_prompt".to_string(), Value::String(negative.clone()));
                }
            }
            input.insert("cfg_scale".to_string(), json!(0.5));
            if let Some(url) = &request.image_url {
                input.insert("image_url".to_string(), Value::String(url.clone()));
            }
        }
        HAILUO => {
            input.insert(
                "duration".to_string(),
                Value::String(request.duration_secs.min(6).to_string()),
            );
            input.insert("resolution".to_string(), Value::String("768P".to_string()));
            if let Some(url) = &request.image_url {
                input.insert("image_url".to_string(), Value::String(url.clone()));
            } else {
                warn!("hailuo is image-to-video and was called without an image");
            }
        }
        BYTEDANCE => {
            input.insert(
                "duration".to_string(),
                Value::String(request.duration_secs.min(5).to_string()),
            );
            input.insert("resolution".to_string(), Value::String(request.quality.clone()));
            input.insert(
                "aspect_ratio".to_string(),
                Value::String(request.aspect_ratio.clone()),
            );
            input.insert("camera_fixed".to_string(), Value::Bool(false));
            if let Some(seed) = request.seed {
                input.insert("seed".to_string(), json!(seed));
            }
        }
        WAN_TURBO => {
            input.insert("resolution".to_string(), Value::String(request.quality.clone()));
            input.insert(
                "aspect_ratio".to_string(),
                Value::String(request.aspect_ratio.clone()),
            );
            input.insert("enable_prompt_expansion".to_string(), Value::Bool(false));
            if let Some(seed) = request.seed {
                input.insert("seed".to_string(), json!(seed));
            }
        }
        WAN_26 => {
            input.insert(
                "duration".to_string(),
                Value::String(request.duration_secs.min(10).to_string()),
            );
            input.insert("resolution".to_string(), Value::String(request.quality.clone()));
            input.insert(
                "aspect_ratio".to_string(),
                Value::String(request.aspect_ratio.clone()),
            );
            if let Some(url) = &request.image_url {
                input.insert("image_url".to_string(), Value::String(url.clone()));
            }
            if let Some(seed) = request.seed {
                input.insert("seed".to_string(), json!(seed));
            }
        }
        _ => {
            input.insert(
                "duration".to_string(),
                Value::String(request.duration_secs.to_string()),
            );
        }
    }

    Value::Object(input)
}

fn poll_path(model_id: &str) -> &'static str {
    match model_id {
        RUNWAY => "/api/v1/runway/record-detail",
        VEO => "/api/v1/veo/record-info",
        _ => "/api/v1/jobs/recordInfo",
    }
}

/// Translate one poll body into an outcome; unrecognized shapes keep polling
pub fn extract_video_result(model_id: &str, body: &Value) -> PollOutcome {
    let data = body.get("data").cloned().unwrap_or(Value::Null);

    match model_id {
        RUNWAY => match data.get("state").and_then(Value::as_str).unwrap_or("") {
            "success" => data
                .get("videoInfo")
                .and_then(|v| v.get("videoUrl"))
                .and_then(Value::as_str)
                .map(|url| PollOutcome::Ready(url.to_string()))
                .unwrap_or(PollOutcome::Failed),
            "fail" => PollOutcome::Failed,
            _ => PollOutcome::Pending,
        },
        VEO => match data.get("status").and_then(Value::as_str).unwrap_or("") {
            "SUCCESS" => data
                .get("response")
                .and_then(|r| r.get("videoUrl"))
                .and_then(Value::as_str)
                .map(|url| PollOutcome::Ready(url.to_string()))
                .unwrap_or(PollOutcome::Failed),
            "FAILED" => PollOutcome::Failed,
            _ => PollOutcome::Pending,
        },
        _ => match data.get("state").and_then(Value::as_str).unwrap_or("") {
            "success" => market_result_url(&data)
                .map(PollOutcome::Ready)
                .unwrap_or(PollOutcome::Failed),
            "failed" | "fail" => PollOutcome::Failed,
            _ => PollOutcome::Pending,
        },
    }
}

/// The market API hides the URL in a `resultJson` string, with an `output`
/// object as a fallback shape
fn market_result_url(data: &Value) -> Option<String> {
    if let Some(raw) = data.get("resultJson").and_then(Value::as_str) {
        if let Ok(result) = serde_json::from_str::<Value>(raw) {
            if let Some(url) = result
                .get("resultUrls")
                .and_then(Value::as_array)
                .and_then(|urls| urls.first())
                .and_then(Value::as_str)
            {
                return Some(url.to_string());
            }
        }
    }

    let output = data.get("output")?;
    if let Some(url) = output
        .get("video_url")
        .or_else(|| output.get("videoUrl"))
        .and_then(Value::as_str)
    {
        return Some(url.to_string());
    }
    output
        .get("videos")
        .and_then(Value::as_array)
        .and_then(|videos| videos.first())
        .and_then(|v| v.get("url"))
        .and_then(Value::as_str)
        .map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> VideoRequest {
        VideoRequest {
            prompt: "Cinematic motion: a quiet garden".to_string(),
            duration_secs: 5,
            quality: "720p".to_string(),
            aspect_ratio: "9:16".to_string(),
            image_url: Some("https://cdn.example/concept.jpg".to_string()),
            negative_prompt: None,
            seed: None,
        }
    }

    #[test]
    fn runway_payload_uses_its_own_endpoint_and_field_names() {
        let (path, payload) = build_payload(RUNWAY, &request());
        assert_eq!(path, "/api/v1/runway/generate");
        assert_eq!(payload["aspectRatio"], "9:16");
        assert_eq!(payload["imageUrl"], "https://cdn.example/concept.jpg");
        assert_eq!(payload["duration"], 5);
    }

    #[test]
    fn runway_duration_caps_at_ten_seconds() {
        let mut req = request();
        req.duration_secs = 30;
        let (_, payload) = build_payload(RUNWAY, &req);
        assert_eq!(payload["duration"], 10);
    }

    #[test]
    fn sora_maps_aspect_labels_and_frames() {
        let (path, payload) = build_payload(SORA, &request());
        assert_eq!(path, "/api/v1/jobs/createTask");
        assert_eq!(payload["model"], SORA);
        assert_eq!(payload["input"]["aspect_ratio"], "portrait");
        assert_eq!(payload["input"]["n_frames"], "10");
        assert_eq!(payload["input"]["size"], "medium");
    }

    #[test]
    fn hailuo_forces_its_resolution_label() {
        let (_, payload) = build_payload(HAILUO, &request());
        assert_eq!(payload["input"]["resolution"], "768P");
        assert_eq!(payload["input"]["duration"], "5");
    }

    #[test]
    fn wan26_carries_image_url_for_image_to_video() {
        let (_, payload) = build_payload(WAN_26, &request());
        assert_eq!(payload["input"]["image_url"], "https://cdn.example/concept.jpg");
        assert_eq!(payload["input"]["resolution"], "720p");
    }

    #[test]
    fn runway_result_extraction() {
        let body = serde_json::json!({
            "data": {"state": "success", "videoInfo": {"videoUrl": "https://cdn.example/v.mp4"}}
        });
        assert_eq!(
            extract_video_result(RUNWAY, &body),
            PollOutcome::Ready("https://cdn.example/v.mp4".to_string())
        );
        let pending = serde_json::json!({"data": {"state": "queueing"}});
        assert_eq!(extract_video_result(RUNWAY, &pending), PollOutcome::Pending);
        let failed = serde_json::json!({"data": {"state": "fail"}});
        assert_eq!(extract_video_result(RUNWAY, &failed), PollOutcome::Failed);
    }

    #[test]
    fn market_result_prefers_result_json() {
        let body = serde_json::json!({
            "data": {
                "state": "success",
                "resultJson": "{\"resultUrls\": [\"https://cdn.example/w.mp4\"]}"
            }
        });
        assert_eq!(
            extract_video_result(WAN_26, &body),
            PollOutcome::Ready("https://cdn.example/w.mp4".to_string())
        );
    }

    #[test]
    fn market_result_falls_back_to_output_shapes() {
        let body = serde_json::json!({
            "data": {"state": "success", "output": {"videos": [{"url": "https://cdn.example/x.mp4"}]}}
        });
        assert_eq!(
            extract_video_result(BYTEDANCE, &body),
            PollOutcome::Ready("https://cdn.example/x.mp4".to_string())
        );
    }

    #[test]
    fn empty_or_unknown_states_keep_polling() {
        assert_eq!(extract_video_result(WAN_26, &serde_json::json!({})), PollOutcome::Pending);
        let odd = serde_json::json!({"data": {"state": "warming_up"}});
        assert_eq!(extract_video_result(KLING, &odd), PollOutcome::Pending);
    }
}
