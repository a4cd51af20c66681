use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use scene_core::{JobId, JobRecord, JobState};

/// Live view of one job while the process runs.
///
/// The registry is the source of truth for metadata during the process
/// lifetime; after a restart the store row is authoritative and metadata
/// starts empty until a worker repopulates it.
#[derive(Debug, Clone)]
pub struct LiveJob {
    pub job_id: JobId,
    pub job_type: String,
    pub state: JobState,
    pub progress: i64,
    pub payload: Value,
    /// Transient facts accumulated during processing (current_phase,
    /// video_model, output_url, ...)
    pub metadata: Map<String, Value>,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub current_retry: u32,
}

impl LiveJob {
    fn from_record(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            job_type: record.job_type.clone(),
            state: JobState::Queued,
            progress: record.progress,
            payload: record.payload.clone(),
            metadata: Map::new(),
            error_message: None,
            created_at: record.created_at,
            started_at: None,
            completed_at: None,
            current_retry: 0,
        }
    }

    /// Retry budget from the payload; the baseline submits zero
    pub fn max_retries(&self) -> u32 {
        self.payload
            .get("max_retries")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32
    }

    /// Per-job timeout override, seconds
    pub fn timeout_secs(&self) -> Option<u64> {
        self.payload.get("timeout_secs").and_then(Value::as_u64)
    }

    pub fn credits_cost(&self) -> i64 {
        self.payload
            .get("credits_cost")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.payload.get("user_id").and_then(Value::as_str)
    }
}

/// Process-local map of live jobs.
///
/// Writes are confined to the worker executing a job and to the submission
/// path; reads (status polling) get cloned snapshots so they never observe
/// a torn record. The lock is never held across an await point.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, LiveJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a job in state `queued`. Keeps the persisted progress so a
    /// recovered job reports where it left off until a worker restarts it.
    pub fn insert_queued(&self, record: &JobRecord) {
        let mut jobs = self.jobs.write();
        jobs.insert(record.job_id.as_str().to_string(), LiveJob::from_record(record));
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.read().contains_key(job_id.as_str())
    }

    /// Transition `queued` to `processing`, stamping started_at and resetting
    /// the run's progress to zero. Returns false when the job is unknown or
    /// no longer queued, which is how a worker loses the race against a
    /// cancellation.
    pub fn mark_processing(&self, job_id: &JobId) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(job_id.as_str()) {
            Some(job) if job.state == JobState::Queued => {
                job.state = JobState::Processing;
                job.progress = 0;
                job.started_at = Some(Utc::now().timestamp());
                true
            }
            _ => false,
        }
    }

    /// Transition `queued` to `cancelled`; false when the job is unknown or
    /// already picked up
    pub fn try_cancel(&self, job_id: &JobId) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(job_id.as_str()) {
            Some(job) if job.state == JobState::Queued => {
                job.state = JobState::Cancelled;
                job.completed_at = Some(Utc::now().timestamp());
                true
            }
            _ => false,
        }
    }

    /// Publish a progress checkpoint; progress is monotone within a run
    pub fn update_progress(&self, job_id: &JobId, progress: i64, phase: Option<&str>) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id.as_str()) {
            job.progress = job.progress.max(progress.clamp(0, 100));
            if let Some(phase) = phase {
                job.metadata
                    .insert("current_phase".to_string(), Value::String(phase.to_string()));
            }
        }
    }

    pub fn set_metadata(&self, job_id: &JobId, key: &str, value: Value) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id.as_str()) {
            job.metadata.insert(key.to_string(), value);
        }
    }

    pub fn mark_completed(&self, job_id: &JobId) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id.as_str()) {
            job.state = JobState::Completed;
            job.progress = 100;
            job.completed_at = Some(Utc::now().timestamp());
        }
    }

    /// Terminal failure: keeps the last published progress
    pub fn mark_error(&self, job_id: &JobId, message: &str) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id.as_str()) {
            job.state = JobState::Error;
            job.error_message = Some(message.to_string());
            job.completed_at = Some(Utc::now().timestamp());
        }
    }

    pub fn mark_cancelled(&self, job_id: &JobId) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id.as_str()) {
            job.state = JobState::Cancelled;
            job.completed_at = Some(Utc::now().timestamp());
        }
    }

    /// Requeue after a retryable failure, bumping the attempt counter
    pub fn mark_requeued(&self, job_id: &JobId) {
        let mut jobs = self.jobs.write();
        if let Some(job) = jobs.get_mut(job_id.as_str()) {
            job.state = JobState::Queued;
            job.progress = 0;
            job.current_retry += 1;
        }
    }

    pub fn snapshot(&self, job_id: &JobId) -> Option<LiveJob> {
        self.jobs.read().get(job_id.as_str()).cloned()
    }

    pub fn state_of(&self, job_id: &JobId) -> Option<JobState> {
        self.jobs.read().get(job_id.as_str()).map(|j| j.state)
    }

    pub fn remove(&self, job_id: &JobId) -> Option<LiveJob> {
        self.jobs.write().remove(job_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
