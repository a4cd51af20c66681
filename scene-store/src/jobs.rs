use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use scene_core::{JobId, JobRecord, JobState};

use crate::{StoreError, StoreResult};

/// Filter for [`JobStore::list`]
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Restrict to these states; `None` means all
    pub states: Option<Vec<JobState>>,
    /// created_at >= this unix timestamp
    pub created_after: Option<i64>,
    /// created_at <= this unix timestamp
    pub created_before: Option<i64>,
    /// Row ceiling; defaults to 100
    pub limit: Option<i64>,
}

/// Durable record of every job. Survives restart; `recover_unfinished` is
/// callable before any other component exists.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
}

impl JobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the jobs table and bring legacy deployments up to the current
    /// schema by adding the `job_type` and `payload` columns online.
    pub async fn init(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                job_type TEXT NOT NULL DEFAULT 'unknown',
                payload TEXT NOT NULL DEFAULT '{}'
            )",
        )
        .execute(&self.pool)
        .await?;

        for (column, ddl) in [
            ("job_type", "ALTER TABLE jobs ADD COLUMN job_type TEXT NOT NULL DEFAULT 'unknown'"),
            ("payload", "ALTER TABLE jobs ADD COLUMN payload TEXT NOT NULL DEFAULT '{}'"),
        ] {
            if !self.has_column(column).await? {
                warn!("migrating jobs table: adding {column}");
                sqlx::query(ddl).execute(&self.pool).await?;
            }
        }

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs(state)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn has_column(&self, column: &str) -> StoreResult<bool> {
        let rows = sqlx::query("PRAGMA table_info(jobs)")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .any(|row| row.try_get::<String, _>("name").map(|n| n == column).unwrap_or(false)))
    }

    /// Insert or update a job. Creates record `created_at` on first insert
    /// and preserves it on every later write.
    pub async fn upsert(
        &self,
        job_id: &JobId,
        state: JobState,
        progress: i64,
        job_type: &str,
        payload: &Value,
    ) -> StoreResult<()> {
        let payload_json = payload.to_string();
        sqlx::query(
            "INSERT INTO jobs (job_id, state, progress, created_at, job_type, payload)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(job_id) DO UPDATE SET
                state = excluded.state,
                progress = excluded.progress,
                job_type = excluded.job_type,
                payload = excluded.payload",
        )
        .bind(job_id.as_str())
        .bind(state.as_str())
        .bind(progress)
        .bind(Utc::now().timestamp())
        .bind(job_type)
        .bind(payload_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch one job; `Ok(None)` means no such row
    pub async fn get(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>> {
        let row = sqlx::query(
            "SELECT job_id, state, progress, created_at, job_type, payload
             FROM jobs WHERE job_id = ?",
        )
        .bind(job_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    /// List jobs newest first, bounded by the filter's limit (default 100)
    pub async fn list(&self, filter: &JobFilter) -> StoreResult<Vec<JobRecord>> {
        let mut sql = String::from(
            "SELECT job_id, state, progress, created_at, job_type, payload FROM jobs WHERE 1=1",
        );
        if let Some(states) = &filter.states {
            if states.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; states.len()].join(", ");
            sql.push_str(&format!(" AND state IN ({placeholders})"));
        }
        if filter.created_after.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if filter.created_before.is_some() {
            sql.push_str(" AND created_at <= ?");
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(states) = &filter.states {
            for state in states {
                query = query.bind(state.as_str());
            }
        }
        if let Some(after) = filter.created_after {
            query = query.bind(after);
        }
        if let Some(before) = filter.created_before {
            query = query.bind(before);
        }
        query = query.bind(filter.limit.unwrap_or(100));

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_record).collect()
    }

    /// Delete a job and cascade its renders. Returns true iff a row existed.
    pub async fn delete(&self, job_id: &JobId) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM renders WHERE job_id = ?")
            .bind(job_id.as_str())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM jobs WHERE job_id = ?")
            .bind(job_id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(job_id = %job_id, "deleted job and cascaded renders");
        }
        Ok(removed)
    }

    /// Jobs that were in flight when the process last stopped, oldest first
    pub async fn recover_unfinished(&self) -> StoreResult<Vec<JobRecord>> {
        let rows = sqlx::query(
            "SELECT job_id, state, progress, created_at, job_type, payload
             FROM jobs WHERE state IN ('queued', 'processing')
             ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_record).collect()
    }

    /// Terminal-failure jobs (error/cancelled), used by the refund sweep
    pub async fn list_failed(&self) -> StoreResult<Vec<JobRecord>> {
        let rows = sqlx::query(
            "SELECT job_id, state, progress, created_at, job_type, payload
             FROM jobs WHERE state IN ('error', 'cancelled')
             ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_record).collect()
    }

    pub async fn count(&self, state: Option<JobState>) -> StoreResult<i64> {
        let row = match state {
            Some(state) => {
                sqlx::query("SELECT COUNT(*) AS n FROM jobs WHERE state = ?")
                    .bind(state.as_str())
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT COUNT(*) AS n FROM jobs")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(row.try_get("n")?)
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> StoreResult<JobRecord> {
    let job_id: String = row.try_get("job_id")?;
    let state_raw: String = row.try_get("state")?;
    let type_raw: String = row.try_get("job_type")?;
    let payload_raw: String = row.try_get("payload")?;

    let state = JobState::parse(&state_raw)
        .ok_or_else(|| StoreError::corrupt("job", &job_id, format!("unknown state {state_raw:?}")))?;
    let payload: Value = serde_json::from_str(&payload_raw)
        .map_err(|e| StoreError::corrupt("job", &job_id, format!("bad payload: {e}")))?;

    Ok(JobRecord {
        job_id: JobId::from(job_id),
        state,
        progress: row.try_get("progress")?,
        job_type: type_raw,
        payload,
        created_at: row.try_get("created_at")?,
    })
}
