use serde::{Deserialize, Serialize};

/// Content-addressed cache entry mapping a source hash to a fetched URL.
///
/// Deduplicates downloads of identical generated artifacts across jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAsset {
    pub hash: String,
    pub url: String,
    pub created_at: i64,
    pub size: Option<i64>,
    pub content_type: Option<String>,
    /// Unix seconds after which the entry is considered stale
    pub expires_at: Option<i64>,
    pub access_count: i64,
    pub last_accessed: i64,
}

impl CachedAsset {
    /// Check whether the entry has expired at `now`
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}
