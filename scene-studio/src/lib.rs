//! Scene Studio: the composition root of the media-generation orchestrator.
//!
//! `StudioApp` wires the durable store, the credits ledger, the in-memory
//! registry, the dispatcher, and the pipeline handlers into one object the
//! HTTP layer talks to. Submission follows the strict sequence
//! `debit -> persist -> register -> enqueue`; a failed debit mutates nothing.

pub mod api;
pub mod error;

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};

use scene_core::{short_id, JobId, JobRecord, JobState, JobType, ModelRegistry, Settings};
use scene_credits::CreditsLedger;
use scene_pipeline::{
    ComposeHandler, Downloader, Encoder, FullUniverseHandler, ImageClient, QuickCreateHandler,
    TtsHandler, VideoClient,
};
use scene_queue::{annotate_payload, Dispatcher, JobRegistry, StatsSnapshot, WorkQueue};
use scene_store::{AssetsCacheStore, JobFilter, JobStore, RenderStore};

pub use api::{HealthReport, JobStatusView, QuickCreateRequest, SubmitReceipt};
pub use error::{StudioResult, SubmitError};

/// Quick-create submissions report a one-minute estimate to the client
const ESTIMATED_TIME_SEC: u64 = 60;
/// Ceiling on the error text exposed through the status API
const MAX_ERROR_MESSAGE_LEN: usize = 500;
/// Assets-cache row ceiling enforced at startup
const MAX_CACHED_ASSETS: i64 = 10_000;

const DURATION_LABELS: [&str; 4] = ["30s", "45s", "2min", "3min"];
const ASPECT_RATIOS: [&str; 3] = ["9:16", "16:9", "1:1"];
const QUALITIES: [&str; 2] = ["720p", "1080p"];

/// The assembled orchestrator
pub struct StudioApp {
    pub settings: Arc<Settings>,
    pub store: JobStore,
    pub renders: RenderStore,
    pub assets: AssetsCacheStore,
    pub ledger: CreditsLedger,
    pub registry: Arc<JobRegistry>,
    pub models: ModelRegistry,
    dispatcher: Dispatcher,
}

impl StudioApp {
    /// Open the database, initialize every table, and wire the dispatcher
    /// with the four pipeline handlers.
    pub async fn build(settings: Settings) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);
        let pool = scene_store::connect(&settings.database_url).await?;

        let store = JobStore::new(pool.clone());
        store.init().await?;
        let renders = RenderStore::new(pool.clone());
        renders.init().await?;
        let assets = AssetsCacheStore::new(pool.clone());
        assets.init().await?;
        let ledger = CreditsLedger::new(pool);
        ledger.init().await?;

        let registry = Arc::new(JobRegistry::new());
        let queue = Arc::new(WorkQueue::new());
        let models = ModelRegistry::builtin(&settings.fallback_video_model);

        let dispatcher = Dispatcher::new(
            registry.clone(),
            store.clone(),
            ledger.clone(),
            queue,
            settings.clone(),
        );

        // A missing ffmpeg does not block boot; encoder calls fail per job
        // and the health surface reports the degradation.
        let encoder = match Encoder::locate() {
            Ok(encoder) => encoder,
            Err(e) => {
                warn!(error = %e, "ffmpeg not found, encoder phases will fail until installed");
                Encoder::with_binary("ffmpeg".into())
            }
        };
        dispatcher.register_handler(Arc::new(QuickCreateHandler::new(renders.clone())));
        dispatcher.register_handler(Arc::new(FullUniverseHandler::new(
            ImageClient::new(&settings),
            VideoClient::new(&settings),
            encoder,
            Downloader::new(Some(assets.clone())),
            renders.clone(),
            models.clone(),
        )));
        dispatcher.register_handler(Arc::new(ComposeHandler::new()));
        dispatcher.register_handler(Arc::new(TtsHandler::new()));

        tokio::fs::create_dir_all(&settings.media_dir).await?;
        info!(media_dir = %settings.media_dir.display(), "studio app assembled");

        Ok(Self {
            settings,
            store,
            renders,
            assets,
            ledger,
            registry,
            models,
            dispatcher,
        })
    }

    /// Startup recovery: re-admit unfinished jobs (without re-debiting),
    /// reconcile any refund the last process lost in a crash, and trim the
    /// assets cache.
    pub async fn recover(&self) -> StudioResult<usize> {
        let admitted = self.dispatcher.recover().await?;
        self.assets.purge_expired().await?;
        self.assets.evict_lru(MAX_CACHED_ASSETS).await?;
        Ok(admitted)
    }

    pub async fn start_workers(&self) {
        self.dispatcher.start_workers().await;
    }

    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.dispatcher.stats()
    }

    /// Component availability for the health endpoint
    pub async fn health(&self) -> HealthReport {
        let total_jobs = match self.store.count(None).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "database health probe failed");
                -1
            }
        };
        HealthReport {
            database_ok: total_jobs >= 0,
            encoder_ok: Encoder::locate().is_ok(),
            total_jobs: total_jobs.max(0),
            video_models: self.models.list().len(),
        }
    }

    /// Submit a quick-create scaffold job (costs no credits in the baseline)
    #[instrument(skip(self, request))]
    pub async fn submit_quick_create(
        &self,
        user_id: &str,
        request: QuickCreateRequest,
    ) -> StudioResult<SubmitReceipt> {
        self.validate_common(&request)?;
        self.validate_video_options(&request)?;

        let job_id = JobId::generate(JobType::QuickCreate);
        let mut payload = json!({ "request": request });
        annotate_payload(&mut payload, user_id, 0);

        self.persist_and_admit(&job_id, JobType::QuickCreate, &payload).await?;
        Ok(SubmitReceipt {
            job_id: job_id.to_string(),
            episode_id: None,
            series_id: None,
            character_id: None,
            status: JobState::Queued.public_name().to_string(),
            estimated_time_sec: Some(ESTIMATED_TIME_SEC),
            message: "Job created successfully".to_string(),
        })
    }

    /// Submit the principal full-universe pipeline. Debits the model cost
    /// up front; a failed debit leaves no trace.
    #[instrument(skip(self, request))]
    pub async fn submit_full_universe(
        &self,
        user_id: &str,
        request: QuickCreateRequest,
    ) -> StudioResult<SubmitReceipt> {
        self.validate_common(&request)?;
        self.validate_video_options(&request)?;

        let model = self
            .models
            .resolve(&request.style_key, request.video_model.as_deref());
        let duration = model.clamp_duration(request.video_duration.unwrap_or(5));
        let credits_cost = model.estimate_credits(duration);

        let job_id = JobId::generate(JobType::QuickCreateFullUniverse);
        let episode_id = short_id(8);
        let series_id = short_id(8);
        let character_id = short_id(8);

        let mut payload = json!({
            "request": request,
            "episode_id": episode_id,
            "series_id": series_id,
            "character_id": character_id,
        });
        annotate_payload(&mut payload, user_id, credits_cost);

        // debit -> persist -> register -> enqueue, in that order.
        if credits_cost > 0 {
            self.ledger
                .debit(
                    user_id,
                    credits_cost,
                    job_id.as_str(),
                    &format!("video generation ({})", model.id),
                )
                .await?;
        }
        self.persist_and_admit(&job_id, JobType::QuickCreateFullUniverse, &payload)
            .await?;

        info!(job_id = %job_id, model = %model.id, credits_cost, "universe job queued");
        Ok(SubmitReceipt {
            job_id: job_id.to_string(),
            episode_id: Some(episode_id),
            series_id: Some(series_id),
            character_id: Some(character_id),
            status: JobState::Queued.public_name().to_string(),
            estimated_time_sec: Some(ESTIMATED_TIME_SEC),
            message: "Job created successfully".to_string(),
        })
    }

    /// Submit a composition job over an opaque compose spec
    pub async fn submit_compose(&self, user_id: &str, spec: Value) -> StudioResult<SubmitReceipt> {
        let job_id = JobId::generate(JobType::Compose);
        let mut payload = json!({ "request": spec });
        annotate_payload(&mut payload, user_id, 0);

        self.persist_and_admit(&job_id, JobType::Compose, &payload).await?;
        Ok(simple_receipt(&job_id))
    }

    /// Submit a text-to-speech job
    pub async fn submit_tts(&self, user_id: &str, text: &str) -> StudioResult<SubmitReceipt> {
        let job_id = JobId::generate(JobType::Tts);
        let mut payload = json!({ "request": { "text": text } });
        annotate_payload(&mut payload, user_id, 0);

        self.persist_and_admit(&job_id, JobType::Tts, &payload).await?;
        Ok(simple_receipt(&job_id))
    }

    /// Job status: the live registry first, then the durable store. After a
    /// restart the store row answers with empty metadata until a worker
    /// repopulates it.
    pub async fn get_status(&self, job_id: &str) -> StudioResult<JobStatusView> {
        let id = JobId::from(job_id);

        if let Some(live) = self.registry.snapshot(&id) {
            let message = live
                .metadata
                .get("current_phase")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Ok(JobStatusView {
                job_id: live.job_id.to_string(),
                status: live.state.public_name().to_string(),
                progress: live.progress,
                created_at: live.created_at,
                started_at: live.started_at,
                message,
                error_message: live.error_message.map(bound_error),
                metadata: live.metadata,
            });
        }

        match self.store.get(&id).await? {
            Some(record) => Ok(view_from_record(&record)),
            None => Err(SubmitError::JobNotFound(job_id.to_string())),
        }
    }

    /// Most recent jobs, newest first
    pub async fn list_recent(&self, limit: i64) -> StudioResult<Vec<JobStatusView>> {
        let records = self
            .store
            .list(&JobFilter {
                limit: Some(limit),
                ..Default::default()
            })
            .await?;
        Ok(records.iter().map(view_from_record).collect())
    }

    /// Delete a job, cascading renders and its artifact directory
    pub async fn delete(&self, job_id: &str) -> StudioResult<bool> {
        let id = JobId::from(job_id);
        let removed = self.store.delete(&id).await?;
        if !removed {
            return Err(SubmitError::JobNotFound(job_id.to_string()));
        }
        self.registry.remove(&id);

        let job_dir = self.settings.job_dir(job_id);
        if let Err(e) = tokio::fs::remove_dir_all(&job_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(job_id, error = %e, "artifact cleanup failed");
            }
        }
        Ok(true)
    }

    /// Cancel a still-queued job; refunds its debit. `Ok(false)` when the
    /// job exists but already left the queue.
    pub async fn cancel(&self, job_id: &str) -> StudioResult<bool> {
        Ok(self.dispatcher.cancel(&JobId::from(job_id)).await?)
    }

    async fn persist_and_admit(
        &self,
        job_id: &JobId,
        job_type: JobType,
        payload: &Value,
    ) -> StudioResult<()> {
        self.store
            .upsert(job_id, JobState::Queued, 0, job_type.as_str(), payload)
            .await?;
        let record = JobRecord {
            job_id: job_id.clone(),
            state: JobState::Queued,
            progress: 0,
            job_type: job_type.as_str().to_string(),
            payload: payload.clone(),
            created_at: chrono::Utc::now().timestamp(),
        };
        self.dispatcher.admit(&record);
        Ok(())
    }

    fn validate_common(&self, request: &QuickCreateRequest) -> StudioResult<()> {
        let len = request.idea_text.chars().count();
        if !(5..=500).contains(&len) {
            return Err(SubmitError::Validation(
                "idea_text must be between 5 and 500 characters".to_string(),
            ));
        }
        if !DURATION_LABELS.contains(&request.duration.as_str()) {
            return Err(SubmitError::Validation(format!(
                "duration must be one of {DURATION_LABELS:?}"
            )));
        }
        Ok(())
    }

    fn validate_video_options(&self, request: &QuickCreateRequest) -> StudioResult<()> {
        if let Some(model_id) = &request.video_model {
            if !self.models.is_known(model_id) {
                return Err(SubmitError::UnknownModel(model_id.clone()));
            }
        }
        if let Some(duration) = request.video_duration {
            if !(5..=10).contains(&duration) {
                return Err(SubmitError::Validation(
                    "video_duration must be between 5 and 10 seconds".to_string(),
                ));
            }
        }
        if let Some(quality) = &request.video_quality {
            if !QUALITIES.contains(&quality.as_str()) {
                return Err(SubmitError::Validation(
                    "video_quality must be 720p or 1080p".to_string(),
                ));
            }
            let model = self
                .models
                .resolve(&request.style_key, request.video_model.as_deref());
            let model_has_standard = model
                .resolutions
                .iter()
                .any(|r| QUALITIES.contains(&r.as_str()));
            if model_has_standard && !model.resolutions.iter().any(|r| r == quality) {
                return Err(SubmitError::Validation(format!(
                    "model {} does not support {quality}",
                    model.id
                )));
            }
        }
        if let Some(aspect) = &request.aspect_ratio {
            if !ASPECT_RATIOS.contains(&aspect.as_str()) {
                return Err(SubmitError::Validation(
                    "aspect_ratio must be 9:16, 16:9 or 1:1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn simple_receipt(job_id: &JobId) -> SubmitReceipt {
    SubmitReceipt {
        job_id: job_id.to_string(),
        episode_id: None,
        series_id: None,
        character_id: None,
        status: JobState::Queued.public_name().to_string(),
        estimated_time_sec: None,
        message: "Job created successfully".to_string(),
    }
}

fn view_from_record(record: &JobRecord) -> JobStatusView {
    JobStatusView {
        job_id: record.job_id.to_string(),
        status: record.state.public_name().to_string(),
        progress: record.progress,
        created_at: record.created_at,
        started_at: None,
        message: None,
        error_message: None,
        metadata: Map::new(),
    }
}

fn bound_error(message: String) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        message
    } else {
        message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
    }
}
