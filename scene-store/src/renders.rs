use chrono::Utc;
use sqlx::{Row, SqlitePool};

use scene_core::{Render, RenderQuality, RenderStatus};

use crate::{StoreError, StoreResult};

/// Produced assets, keyed by (job_id, item_id). Rows cascade-delete with
/// their parent job via [`crate::JobStore::delete`].
#[derive(Clone)]
pub struct RenderStore {
    pool: SqlitePool,
}

impl RenderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS renders (
                job_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                hash TEXT NOT NULL,
                quality TEXT NOT NULL,
                url TEXT,
                status TEXT NOT NULL,
                created_at INTEGER,
                updated_at INTEGER,
                PRIMARY KEY (job_id, item_id)
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_renders_job_id ON renders(job_id)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert(&self, render: &Render) -> StoreResult<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO renders (job_id, item_id, hash, quality, url, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(job_id, item_id) DO UPDATE SET
                hash = excluded.hash,
                quality = excluded.quality,
                url = excluded.url,
                status = excluded.status,
                updated_at = excluded.updated_at",
        )
        .bind(&render.job_id)
        .bind(&render.item_id)
        .bind(&render.hash)
        .bind(render.quality.as_str())
        .bind(render.url.as_deref())
        .bind(render.status.as_str())
        .bind(render.created_at.unwrap_or(now))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, job_id: &str, item_id: &str) -> StoreResult<Option<Render>> {
        let row = sqlx::query(
            "SELECT job_id, item_id, hash, quality, url, status, created_at, updated_at
             FROM renders WHERE job_id = ? AND item_id = ?",
        )
        .bind(job_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_render).transpose()
    }

    /// All renders for a job, stable item order
    pub async fn list_for_job(&self, job_id: &str) -> StoreResult<Vec<Render>> {
        let rows = sqlx::query(
            "SELECT job_id, item_id, hash, quality, url, status, created_at, updated_at
             FROM renders WHERE job_id = ? ORDER BY item_id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_render).collect()
    }

    pub async fn update_status(
        &self,
        job_id: &str,
        item_id: &str,
        status: RenderStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE renders SET status = ?, updated_at = ? WHERE job_id = ? AND item_id = ?",
        )
        .bind(status.as_str())
        .bind(Utc::now().timestamp())
        .bind(job_id)
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_url(&self, job_id: &str, item_id: &str, url: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE renders SET url = ?, updated_at = ? WHERE job_id = ? AND item_id = ?",
        )
        .bind(url)
        .bind(Utc::now().timestamp())
        .bind(job_id)
        .bind(item_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_render(row: sqlx::sqlite::SqliteRow) -> StoreResult<Render> {
    let job_id: String = row.try_get("job_id")?;
    let item_id: String = row.try_get("item_id")?;
    let quality_raw: String = row.try_get("quality")?;
    let status_raw: String = row.try_get("status")?;

    let key = format!("{job_id}/{item_id}");
    let quality = RenderQuality::parse(&quality_raw)
        .ok_or_else(|| StoreError::corrupt("render", &key, format!("unknown quality {quality_raw:?}")))?;
    let status = RenderStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::corrupt("render", &key, format!("unknown status {status_raw:?}")))?;

    Ok(Render {
        job_id,
        item_id,
        hash: row.try_get("hash")?,
        quality,
        url: row.try_get("url")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JobStore, connect};
    use scene_core::{JobId, JobState};
    use serde_json::json;

    async fn stores() -> (tempfile::TempDir, JobStore, RenderStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("renders.db").display());
        let pool = connect(&url).await.unwrap();
        let jobs = JobStore::new(pool.clone());
        jobs.init().await.unwrap();
        let renders = RenderStore::new(pool);
        renders.init().await.unwrap();
        (dir, jobs, renders)
    }

    fn render(job_id: &str, item_id: &str) -> Render {
        Render {
            job_id: job_id.to_string(),
            item_id: item_id.to_string(),
            hash: "abc123".to_string(),
            quality: RenderQuality::High,
            url: None,
            status: RenderStatus::Pending,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn upsert_then_update_status_and_url() {
        let (_dir, _jobs, renders) = stores().await;
        renders.upsert(&render("qcf-1", "universe_complete")).await.unwrap();

        assert!(renders
            .update_status("qcf-1", "universe_complete", RenderStatus::Completed)
            .await
            .unwrap());
        assert!(renders
            .update_url("qcf-1", "universe_complete", "/files/qcf-1/universe_complete.mp4")
            .await
            .unwrap());

        let stored = renders.get("qcf-1", "universe_complete").await.unwrap().unwrap();
        assert_eq!(stored.status, RenderStatus::Completed);
        assert_eq!(stored.url.as_deref(), Some("/files/qcf-1/universe_complete.mp4"));
    }

    #[tokio::test]
    async fn renders_cascade_with_job_delete() {
        let (_dir, jobs, renders) = stores().await;
        let id = JobId::from("qcf-2");
        jobs.upsert(&id, JobState::Completed, 100, "quick_create_full_universe", &json!({}))
            .await
            .unwrap();
        renders.upsert(&render("qcf-2", "scene_001")).await.unwrap();
        renders.upsert(&render("qcf-2", "scene_002")).await.unwrap();

        assert!(jobs.delete(&id).await.unwrap());
        assert!(renders.list_for_job("qcf-2").await.unwrap().is_empty());
    }
}
