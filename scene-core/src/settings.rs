use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Runtime configuration, read from environment variables with defaults.
///
/// Unknown variables are ignored; every knob has a production-sensible
/// default so a bare environment still boots.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Number of concurrent dispatcher workers
    pub worker_concurrency: usize,
    /// How long an idle worker waits on the queue before looping, seconds
    pub worker_poll_interval_secs: u64,
    /// Hard ceiling on a single handler run, seconds
    pub job_timeout_secs: u64,
    /// Root directory for per-job artifacts (`<media_dir>/<job_id>/…`)
    pub media_dir: PathBuf,
    /// SQLite database URL
    pub database_url: String,
    /// Base URL under which `/files/...` is publicly served
    pub public_base_url: String,
    /// Default model id when neither override nor style default applies
    pub fallback_video_model: String,
    /// API key for the generation provider; empty disables external calls
    pub kie_api_key: String,
    /// Provider API origin
    pub kie_base_url: String,
    /// Style key to soundtrack URL
    pub soundtrack_urls: HashMap<String, String>,
    /// Soundtrack used when a style has no mapping
    pub default_soundtrack_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn builtin_soundtracks() -> HashMap<String, String> {
    [
        (
            "cinematic_realism",
            "https://cdn.pixabay.com/audio/2024/02/14/audio-cinematic-ambient.mp3",
        ),
        (
            "stylized_3d",
            "https://cdn.pixabay.com/audio/2023/11/02/audio-playful-orchestra.mp3",
        ),
        (
            "anime",
            "https://cdn.pixabay.com/audio/2024/05/21/audio-jpop-uplift.mp3",
        ),
        (
            "documentary_grit",
            "https://cdn.pixabay.com/audio/2023/08/07/audio-minimal-piano.mp3",
        ),
        (
            "film_noir",
            "https://cdn.pixabay.com/audio/2023/03/19/audio-noir-jazz.mp3",
        ),
        (
            "retro_vhs",
            "https://cdn.pixabay.com/audio/2024/01/30/audio-synthwave-tape.mp3",
        ),
        (
            "fantasy_illustration",
            "https://cdn.pixabay.com/audio/2023/12/12/audio-epic-strings.mp3",
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            worker_concurrency: 4,
            worker_poll_interval_secs: 1,
            job_timeout_secs: 300,
            media_dir: PathBuf::from("./media"),
            database_url: "sqlite://./scene_studio.db".to_string(),
            public_base_url: "http://localhost:8000".to_string(),
            fallback_video_model: "runway-gen3".to_string(),
            kie_api_key: String::new(),
            kie_base_url: "https://api.kie.ai".to_string(),
            soundtrack_urls: builtin_soundtracks(),
            default_soundtrack_url:
                "https://cdn.pixabay.com/audio/2024/02/14/audio-cinematic-ambient.mp3".to_string(),
        }
    }
}

impl Settings {
    /// Build settings from the process environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // SOUNDTRACK_URLS may override the builtin map with a JSON object
        let soundtrack_urls = env::var("SOUNDTRACK_URLS")
            .ok()
            .and_then(|raw| serde_json::from_str::<HashMap<String, String>>(&raw).ok())
            .unwrap_or_else(builtin_soundtracks);

        Self {
            worker_concurrency: env_parse("WORKER_CONCURRENCY", defaults.worker_concurrency),
            worker_poll_interval_secs: env_parse(
                "WORKER_POLL_INTERVAL",
                defaults.worker_poll_interval_secs,
            ),
            job_timeout_secs: env_parse("WORKER_TIMEOUT", defaults.job_timeout_secs),
            media_dir: PathBuf::from(env_or("MEDIA_DIR", "./media")),
            database_url: env_or("DATABASE_URL", &defaults.database_url),
            public_base_url: env_or("PUBLIC_BASE_URL", &defaults.public_base_url),
            fallback_video_model: env_or("FALLBACK_VIDEO_MODEL", &defaults.fallback_video_model),
            kie_api_key: env_or("KIE_API_KEY", ""),
            kie_base_url: env_or("KIE_BASE_URL", &defaults.kie_base_url),
            soundtrack_urls,
            default_soundtrack_url: env_or(
                "DEFAULT_SOUNDTRACK_URL",
                &defaults.default_soundtrack_url,
            ),
        }
    }

    /// Soundtrack for a style, falling back to the default track
    pub fn soundtrack_for(&self, style_key: &str) -> &str {
        self.soundtrack_urls
            .get(style_key)
            .map(String::as_str)
            .unwrap_or(&self.default_soundtrack_url)
    }

    /// Directory owned exclusively by one job's artifacts
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.media_dir.join(job_id)
    }

    /// Public URL for a file under a job's directory
    pub fn public_file_url(&self, job_id: &str, file_name: &str) -> String {
        format!("{}/files/{}/{}", self.public_base_url, job_id, file_name)
    }
}
