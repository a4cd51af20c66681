use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use scene_core::{JobId, JobState, JobType, Settings};
use scene_store::JobStore;

use crate::error::HandlerError;
use crate::registry::JobRegistry;

/// Everything a pipeline handler may touch while driving one job.
///
/// Progress checkpoints go to the registry and are mirrored to the store
/// with the same state and progress; metadata stays registry-only.
pub struct JobContext {
    pub job_id: JobId,
    pub job_type: JobType,
    pub payload: Value,
    pub settings: Arc<Settings>,
    registry: Arc<JobRegistry>,
    store: JobStore,
}

impl JobContext {
    pub(crate) fn new(
        job_id: JobId,
        job_type: JobType,
        payload: Value,
        settings: Arc<Settings>,
        registry: Arc<JobRegistry>,
        store: JobStore,
    ) -> Self {
        Self {
            job_id,
            job_type,
            payload,
            settings,
            registry,
            store,
        }
    }

    /// Publish a phase boundary: progress plus `current_phase`, mirrored to
    /// the store. A failed mirror write is logged but does not abort the
    /// phase; the registry remains the live source of truth.
    pub async fn publish_progress(&self, progress: i64, phase: &str) {
        self.registry
            .update_progress(&self.job_id, progress, Some(phase));
        self.mirror(JobState::Processing, progress).await;
    }

    /// Record a transient fact about the job (registry-only)
    pub fn set_metadata(&self, key: &str, value: Value) {
        self.registry.set_metadata(&self.job_id, key, value);
    }

    /// Request field lookup: `payload.request.<key>` first, then the
    /// payload root
    pub fn request_field(&self, key: &str) -> Option<&Value> {
        self.payload
            .get("request")
            .and_then(|r| r.get(key))
            .or_else(|| self.payload.get(key))
    }

    pub fn request_str(&self, key: &str) -> Option<&str> {
        self.request_field(key).and_then(Value::as_str)
    }

    pub fn request_u64(&self, key: &str) -> Option<u64> {
        self.request_field(key).and_then(Value::as_u64)
    }

    async fn mirror(&self, state: JobState, progress: i64) {
        if let Err(e) = self
            .store
            .upsert(
                &self.job_id,
                state,
                progress,
                self.job_type.as_str(),
                &self.payload,
            )
            .await
        {
            warn!(job_id = %self.job_id, error = %e, "progress mirror write failed");
        }
    }
}

/// One per-job-type state machine. The four types form a closed set known
/// at build time; the dispatcher routes by [`JobHandler::job_type`].
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> JobType;

    /// Drive the job to completion. Success means the worker marks the job
    /// `completed`; an error carries the client-visible message and decides
    /// retry eligibility.
    async fn run(&self, ctx: &JobContext) -> Result<(), HandlerError>;
}
