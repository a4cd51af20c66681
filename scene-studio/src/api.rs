use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Submission request for the quick-create family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickCreateRequest {
    pub idea_text: String,
    /// Overall clip length label from the client: 30s, 45s, 2min, 3min
    pub duration: String,
    pub style_key: String,
    #[serde(default = "default_true")]
    pub auto_create_universe: bool,
    /// Override: force a specific video model id
    #[serde(default)]
    pub video_model: Option<String>,
    /// Generated clip length in seconds (5-10)
    #[serde(default)]
    pub video_duration: Option<u32>,
    /// 720p or 1080p
    #[serde(default)]
    pub video_quality: Option<String>,
    /// 9:16 (shorts), 16:9, 1:1
    #[serde(default)]
    pub aspect_ratio: Option<String>,
}

fn default_true() -> bool {
    true
}

/// What the submission path hands back to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_sec: Option<u64>,
    pub message: String,
}

/// Component availability summary consumed by the HTTP layer's health
/// endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub database_ok: bool,
    pub encoder_ok: bool,
    pub total_jobs: i64,
    pub video_models: usize,
}

/// Client-facing job status. Status strings are the public set
/// (`queued`, `processing`, `done`, `error`, `cancelled`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub status: String,
    pub progress: i64,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub metadata: Map<String, Value>,
}
