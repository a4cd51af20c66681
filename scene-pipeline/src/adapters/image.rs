use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use scene_core::Settings;

use super::{PollOutcome, PollPolicy};

/// Adapter for the image-generation provider.
///
/// `generate` returns the URL of the produced image, or `None` when the
/// provider could not produce one for any reason.
pub struct ImageClient {
    http: Client,
    api_key: String,
    base_url: String,
    poll: PollPolicy,
}

impl ImageClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            http: Client::new(),
            api_key: settings.kie_api_key.clone(),
            base_url: settings.kie_base_url.clone(),
            poll: PollPolicy::default(),
        }
    }

    /// Override the polling schedule (tests, aggressive deployments)
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub async fn generate(&self, prompt: &str, width: u32, height: u32) -> Option<String> {
        if self.api_key.len() < 10 {
            warn!("image provider key not configured, skipping generation");
            return None;
        }

        info!(width, height, "requesting concept image");
        let payload = json!({
            "prompt": prompt,
            "size": format!("{width}x{height}"),
        });

        let response = self
            .http
            .post(format!("{}/api/v1/gpt4o-image/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "image request rejected");
            return None;
        }
        let body: Value = response.json().await.ok()?;
        let task_id = body
            .get("data")
            .and_then(|d| d.get("taskId"))
            .and_then(Value::as_str)?
            .to_string();

        debug!(task_id, "image task created, polling");
        self.poll_result(&task_id).await
    }

    async fn poll_result(&self, task_id: &str) -> Option<String> {
        for attempt in 0..self.poll.max_attempts {
            tokio::time::sleep(self.poll.interval).await;

            let response = self
                .http
                .get(format!("{}/api/v1/gpt4o-image/result/{task_id}", self.base_url))
                .bearer_auth(&self.api_key)
                .send()
                .await;
            let Ok(response) = response else {
                continue;
            };
            if !response.status().is_success() {
                debug!(attempt, status = %response.status(), "image poll non-200");
                continue;
            }
            let Ok(body) = response.json::<Value>().await else {
                continue;
            };

            match extract_image_result(&body) {
                PollOutcome::Ready(url) => {
                    info!(url, "concept image ready");
                    return Some(url);
                }
                PollOutcome::Failed => {
                    warn!(task_id, "image generation failed");
                    return None;
                }
                PollOutcome::Pending => {}
            }
        }
        warn!(task_id, "image generation timed out");
        None
    }
}

/// Translate one poll body into an outcome
pub fn extract_image_result(body: &Value) -> PollOutcome {
    let data = body.get("data").cloned().unwrap_or(Value::Null);
    if let Some(url) = data.get("imageUrl").and_then(Value::as_str) {
        if !url.is_empty() {
            return PollOutcome::Ready(url.to_string());
        }
    }
    match data.get("state").and_then(Value::as_str).unwrap_or("") {
        "failed" | "fail" => PollOutcome::Failed,
        _ => PollOutcome::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ready_when_image_url_present() {
        let body = json!({"data": {"imageUrl": "https://cdn.example/a.jpg"}});
        assert_eq!(
            extract_image_result(&body),
            PollOutcome::Ready("https://cdn.example/a.jpg".to_string())
        );
    }

    #[test]
    fn failed_state_is_terminal() {
        let body = json!({"data": {"state": "failed"}});
        assert_eq!(extract_image_result(&body), PollOutcome::Failed);
    }

    #[test]
    fn anything_else_keeps_polling() {
        assert_eq!(extract_image_result(&json!({})), PollOutcome::Pending);
        assert_eq!(
            extract_image_result(&json!({"data": {"state": "generating"}})),
            PollOutcome::Pending
        );
    }
}
