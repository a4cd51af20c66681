use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use scene_core::CachedAsset;

use crate::StoreResult;

/// Content-addressed cache of fetched artifacts: hash to URL with TTL,
/// access statistics, and LRU eviction.
#[derive(Clone)]
pub struct AssetsCacheStore {
    pool: SqlitePool,
}

impl AssetsCacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS assets_cache (
                hash TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                size INTEGER,
                content_type TEXT,
                expires_at INTEGER,
                access_count INTEGER NOT NULL DEFAULT 0,
                last_accessed INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_assets_cache_last_accessed ON assets_cache(last_accessed)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or refresh an entry. `ttl_secs = None` keeps it until evicted.
    pub async fn put(
        &self,
        hash: &str,
        url: &str,
        size: Option<i64>,
        content_type: Option<&str>,
        ttl_secs: Option<i64>,
    ) -> StoreResult<()> {
        let now = Utc::now().timestamp();
        let expires_at = ttl_secs.map(|ttl| now + ttl);
        sqlx::query(
            "INSERT INTO assets_cache (hash, url, created_at, size, content_type, expires_at, access_count, last_accessed)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)
             ON CONFLICT(hash) DO UPDATE SET
                url = excluded.url,
                size = excluded.size,
                content_type = excluded.content_type,
                expires_at = excluded.expires_at,
                last_accessed = excluded.last_accessed",
        )
        .bind(hash)
        .bind(url)
        .bind(now)
        .bind(size)
        .bind(content_type)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Cache hit check: expired entries are invisible; hits bump the access
    /// statistics.
    pub async fn get(&self, hash: &str) -> StoreResult<Option<CachedAsset>> {
        let now = Utc::now().timestamp();
        let row = sqlx::query(
            "SELECT hash, url, created_at, size, content_type, expires_at, access_count, last_accessed
             FROM assets_cache
             WHERE hash = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query(
            "UPDATE assets_cache SET access_count = access_count + 1, last_accessed = ? WHERE hash = ?",
        )
        .bind(now)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        Ok(Some(CachedAsset {
            hash: row.try_get("hash")?,
            url: row.try_get("url")?,
            created_at: row.try_get("created_at")?,
            size: row.try_get("size")?,
            content_type: row.try_get("content_type")?,
            expires_at: row.try_get("expires_at")?,
            access_count: row.try_get::<i64, _>("access_count")? + 1,
            last_accessed: now,
        }))
    }

    /// Drop entries past their expiry; returns rows removed
    pub async fn purge_expired(&self) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM assets_cache WHERE expires_at IS NOT NULL AND expires_at <= ?",
        )
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        let removed = result.rows_affected();
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        Ok(removed)
    }

    /// Evict least-recently-accessed entries until at most `max_entries`
    /// remain; returns rows removed
    pub async fn evict_lru(&self, max_entries: i64) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM assets_cache WHERE hash IN (
                SELECT hash FROM assets_cache
                ORDER BY last_accessed DESC, access_count DESC
                LIMIT -1 OFFSET ?
            )",
        )
        .bind(max_entries.max(0))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect;

    async fn cache() -> (tempfile::TempDir, AssetsCacheStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("cache.db").display());
        let pool = connect(&url).await.unwrap();
        let store = AssetsCacheStore::new(pool);
        store.init().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn hit_bumps_access_stats() {
        let (_dir, store) = cache().await;
        store
            .put("h1", "https://cdn.example/clip.mp4", Some(1024), Some("video/mp4"), None)
            .await
            .unwrap();

        let first = store.get("h1").await.unwrap().unwrap();
        assert_eq!(first.access_count, 1);
        let second = store.get("h1").await.unwrap().unwrap();
        assert_eq!(second.access_count, 2);
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_and_purgeable() {
        let (_dir, store) = cache().await;
        store.put("h2", "https://cdn.example/a.jpg", None, None, Some(-10)).await.unwrap();

        assert!(store.get("h2").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lru_eviction_keeps_most_recent() {
        let (_dir, store) = cache().await;
        for i in 0..4 {
            store
                .put(&format!("h{i}"), "https://cdn.example/x", None, None, None)
                .await
                .unwrap();
        }
        // Touch h3 so it is the most recently used.
        store.get("h3").await.unwrap();

        let removed = store.evict_lru(2).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store.get("h3").await.unwrap().is_some());
    }
}
