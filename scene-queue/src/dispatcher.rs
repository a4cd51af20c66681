use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use scene_core::{JobId, JobRecord, JobState, JobType, Settings};
use scene_credits::{CreditKind, CreditsLedger};
use scene_store::JobStore;

use crate::error::{DispatchError, DispatchResult, HandlerError};
use crate::handler::{JobContext, JobHandler};
use crate::queue::WorkQueue;
use crate::registry::{JobRegistry, LiveJob};

/// Atomic counters over the dispatcher's lifetime
#[derive(Default)]
pub struct DispatcherStats {
    pub total: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
}

/// Point-in-time copy of [`DispatcherStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    registry: Arc<JobRegistry>,
    store: JobStore,
    ledger: CreditsLedger,
    queue: Arc<WorkQueue>,
    handlers: RwLock<HashMap<&'static str, Arc<dyn JobHandler>>>,
    settings: Arc<Settings>,
    stats: DispatcherStats,
}

/// Bounded pool of cooperative workers consuming the shared FIFO queue.
///
/// Each worker drives at most one job at a time; every provider call and
/// encoder wait inside a handler is an await point, so N workers drive N
/// slow external calls on O(N) resources.
pub struct Dispatcher {
    inner: Arc<Inner>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: JobStore,
        ledger: CreditsLedger,
        queue: Arc<WorkQueue>,
        settings: Arc<Settings>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                registry,
                store,
                ledger,
                queue,
                handlers: RwLock::new(HashMap::new()),
                settings,
                stats: DispatcherStats::default(),
            }),
            shutdown_tx,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Register the handler for one job type; last registration wins
    pub fn register_handler(&self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().as_str();
        self.inner.handlers.write().insert(job_type, handler);
        info!(job_type, "registered job handler");
    }

    /// Install an already-persisted job in the registry and make it visible
    /// to workers. The caller is responsible for the `debit -> persist`
    /// prefix of the submission sequence.
    pub fn admit(&self, record: &JobRecord) {
        self.inner.registry.insert_queued(record);
        self.inner.queue.push(record.job_id.clone());
        self.inner.stats.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Re-admit unfinished jobs from the store and reconcile missing
    /// refunds. Idempotent: jobs already live in the registry are skipped
    /// and credits are never re-debited.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> DispatchResult<usize> {
        let records = self.inner.store.recover_unfinished().await?;
        let mut admitted = 0;

        for mut record in records {
            if self.inner.registry.contains(&record.job_id) {
                continue;
            }
            if record.state != JobState::Queued {
                // A job caught mid-processing restarts from the queue.
                self.inner
                    .store
                    .upsert(
                        &record.job_id,
                        JobState::Queued,
                        record.progress,
                        &record.job_type,
                        &record.payload,
                    )
                    .await?;
                record.state = JobState::Queued;
            }
            self.admit(&record);
            admitted += 1;
        }

        let reconciled = self.reconcile_refunds().await?;
        info!(admitted, reconciled, "recovery complete");
        Ok(admitted)
    }

    /// Close the crash window between a terminal-failure write and its
    /// refund: credit every failed job whose debit lacks a matching refund.
    async fn reconcile_refunds(&self) -> DispatchResult<usize> {
        let failed = self.inner.store.list_failed().await?;
        let mut reconciled = 0;

        for record in failed {
            let cost = record.credits_cost();
            if cost <= 0 {
                continue;
            }
            let Some(user_id) = record.user_id() else {
                continue;
            };
            let job_id = record.job_id.as_str();
            let debited = self.inner.ledger.debit_total_for_job(job_id).await?;
            let refunded = self.inner.ledger.refund_total_for_job(job_id).await?;
            if debited >= cost && refunded < cost {
                warn!(job_id, user_id, missing = cost - refunded, "reconciling orphan debit");
                self.inner
                    .ledger
                    .credit(
                        user_id,
                        cost - refunded,
                        CreditKind::Refund,
                        "reconciled refund for failed job",
                        Some(job_id),
                    )
                    .await?;
                reconciled += 1;
            }
        }
        Ok(reconciled)
    }

    /// Spawn the worker pool (size from settings)
    pub async fn start_workers(&self) {
        let count = self.inner.settings.worker_concurrency.max(1);
        let mut workers = self.workers.lock().await;
        for worker_id in 0..count {
            let inner = self.inner.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            workers.push(tokio::spawn(async move {
                inner.worker_loop(worker_id, shutdown_rx).await;
            }));
        }
        info!(count, "workers started");
    }

    /// Signal shutdown and wait for workers to finish their current jobs
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
        info!("dispatcher stopped");
    }

    /// Cancel a job that has not been picked up yet. Returns `Ok(false)`
    /// when the job exists but is no longer cancellable.
    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    pub async fn cancel(&self, job_id: &JobId) -> DispatchResult<bool> {
        if self.inner.registry.snapshot(job_id).is_none() {
            return match self.inner.store.get(job_id).await? {
                None => Err(DispatchError::JobNotFound(job_id.to_string())),
                // Not live in this process: only a still-queued row can be
                // cancelled, and it has not been admitted to any worker.
                Some(record) if record.state == JobState::Queued => {
                    self.inner
                        .store
                        .upsert(
                            job_id,
                            JobState::Cancelled,
                            record.progress,
                            &record.job_type,
                            &record.payload,
                        )
                        .await?;
                    self.inner.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                    self.refund_record_cost(record.credits_cost(), record.user_id(), job_id)
                        .await;
                    Ok(true)
                }
                Some(_) => Ok(false),
            };
        }

        if !self.inner.registry.try_cancel(job_id) {
            return Ok(false);
        }
        self.inner.queue.remove(job_id);

        let live = self.inner.registry.snapshot(job_id);
        if let Some(live) = &live {
            self.inner.mirror(live, JobState::Cancelled, live.progress).await;
        }
        self.inner.stats.cancelled.fetch_add(1, Ordering::Relaxed);

        if let Some(live) = live {
            self.refund_record_cost(live.credits_cost(), live.user_id(), job_id)
                .await;
        }
        info!("job cancelled before pickup");
        Ok(true)
    }

    async fn refund_record_cost(&self, cost: i64, user_id: Option<&str>, job_id: &JobId) {
        if cost > 0 {
            if let Some(user_id) = user_id {
                self.inner
                    .refund(user_id, cost, job_id, "refund for cancelled job")
                    .await;
            }
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.inner.registry
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.inner.queue
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }
}

impl Inner {
    async fn worker_loop(self: Arc<Self>, worker_id: usize, mut shutdown_rx: watch::Receiver<bool>) {
        info!(worker_id, "worker started");
        let poll = Duration::from_secs(self.settings.worker_poll_interval_secs.max(1));

        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                popped = self.queue.pop(poll) => {
                    // The arm body is not raced against shutdown, so a job in
                    // flight always reaches a terminal state.
                    if let Some(job_id) = popped {
                        self.process(worker_id, job_id).await;
                    }
                }
            }
        }
        info!(worker_id, "worker stopped");
    }

    #[instrument(skip(self, job_id), fields(job_id = %job_id))]
    async fn process(&self, worker_id: usize, job_id: JobId) {
        let Some(live) = self.registry.snapshot(&job_id) else {
            warn!("queued reference without registry entry, dropping");
            return;
        };
        if !self.registry.mark_processing(&job_id) {
            debug!(state = %live.state, "skipping job no longer queued");
            return;
        }
        self.mirror(&live, JobState::Processing, 0).await;

        let Some(job_type) = JobType::parse(&live.job_type) else {
            self.finish_failure(
                &job_id,
                HandlerError::permanent(format!("unknown job type: {}", live.job_type)),
            )
            .await;
            return;
        };
        let handler = self.handlers.read().get(job_type.as_str()).cloned();
        let Some(handler) = handler else {
            self.finish_failure(
                &job_id,
                HandlerError::permanent(format!("no handler registered for {job_type}")),
            )
            .await;
            return;
        };

        let ctx = JobContext::new(
            job_id.clone(),
            job_type,
            live.payload.clone(),
            self.settings.clone(),
            self.registry.clone(),
            self.store.clone(),
        );
        let timeout_secs = live.timeout_secs().unwrap_or(self.settings.job_timeout_secs);

        let outcome = tokio::time::timeout(Duration::from_secs(timeout_secs), handler.run(&ctx)).await;
        match outcome {
            Ok(Ok(())) => {
                self.registry.mark_completed(&job_id);
                if let Some(done) = self.registry.snapshot(&job_id) {
                    self.mirror(&done, JobState::Completed, 100).await;
                }
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                info!(job_type = %job_type, "job completed");
            }
            Ok(Err(err)) => self.finish_failure(&job_id, err).await,
            Err(_) => {
                self.finish_failure(
                    &job_id,
                    HandlerError::permanent(format!("job timed out after {timeout_secs}s")),
                )
                .await;
            }
        }
    }

    /// Terminal failure path: mark `error`, mirror, count, refund. Retryable
    /// errors with remaining budget requeue instead.
    async fn finish_failure(&self, job_id: &JobId, err: HandlerError) {
        let snapshot = self.registry.snapshot(job_id);

        if err.is_retryable() {
            if let Some(live) = &snapshot {
                if live.current_retry < live.max_retries() {
                    warn!(job_id = %job_id, error = %err, attempt = live.current_retry + 1, "requeueing after retryable failure");
                    self.registry.mark_requeued(job_id);
                    self.mirror(live, JobState::Queued, 0).await;
                    self.queue.push(job_id.clone());
                    return;
                }
            }
        }

        error!(job_id = %job_id, error = %err, "job failed");
        self.registry.mark_error(job_id, err.message());
        if let Some(failed) = self.registry.snapshot(job_id) {
            self.mirror(&failed, JobState::Error, failed.progress).await;
        }
        self.stats.failed.fetch_add(1, Ordering::Relaxed);

        if let Some(live) = snapshot {
            let cost = live.credits_cost();
            if cost > 0 {
                if let Some(user_id) = live.user_id() {
                    self.refund(user_id, cost, job_id, "refund for failed job").await;
                }
            }
        }
    }

    /// Issue a refund, retrying on store/ledger trouble. Persistent failure
    /// is left for the startup reconciliation sweep.
    async fn refund(&self, user_id: &str, amount: i64, job_id: &JobId, description: &str) {
        let mut backoff = Duration::from_millis(100);
        for attempt in 1..=3u32 {
            match self
                .ledger
                .credit(user_id, amount, CreditKind::Refund, description, Some(job_id.as_str()))
                .await
            {
                Ok(()) => {
                    info!(job_id = %job_id, user_id, amount, "refund issued");
                    return;
                }
                Err(e) if attempt < 3 => {
                    warn!(job_id = %job_id, attempt, error = %e, "refund attempt failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "refund failed, deferring to startup reconciliation");
                }
            }
        }
    }

    /// Mirror the registry view into the durable store; never fatal here
    async fn mirror(&self, live: &LiveJob, state: JobState, progress: i64) {
        if let Err(e) = self
            .store
            .upsert(&live.job_id, state, progress, &live.job_type, &live.payload)
            .await
        {
            warn!(job_id = %live.job_id, error = %e, "store mirror write failed");
        }
    }
}

/// Annotate a payload with the ownership facts the refund path needs
pub fn annotate_payload(payload: &mut Value, user_id: &str, credits_cost: i64) {
    if let Value::Object(map) = payload {
        map.insert("user_id".to_string(), Value::String(user_id.to_string()));
        map.insert("credits_cost".to_string(), Value::from(credits_cost));
    }
}
