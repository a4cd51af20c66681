use std::path::Path;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use scene_store::AssetsCacheStore;

use crate::{PipelineError, PipelineResult};

/// Artifact fetcher with content-addressed bookkeeping.
///
/// Every successful fetch is recorded in the assets cache under the sha-256
/// of the source URL so repeat fetches of identical generated artifacts are
/// observable and deduplicable across jobs.
pub struct Downloader {
    http: Client,
    cache: Option<AssetsCacheStore>,
}

/// 24 hours, matching provider artifact retention
const CACHE_TTL_SECS: i64 = 24 * 3600;

impl Downloader {
    pub fn new(cache: Option<AssetsCacheStore>) -> Self {
        Self {
            http: Client::new(),
            cache,
        }
    }

    /// sha-256 hex digest of a source URL
    pub fn content_hash(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Download `url` into `dest`, creating parent directories. Returns the
    /// number of bytes written.
    pub async fn fetch_to_file(&self, url: &str, dest: &Path) -> PipelineResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let hash = Self::content_hash(url);
        if let Some(cache) = &self.cache {
            if let Ok(Some(hit)) = cache.get(&hash).await {
                debug!(url, fetches = hit.access_count, "artifact fetched before");
            }
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(PipelineError::Download {
                url: url.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response.bytes().await.map_err(|e| PipelineError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(dest, &bytes).await?;

        let size = bytes.len() as u64;
        debug!(url, size, dest = %dest.display(), "downloaded artifact");

        if let Some(cache) = &self.cache {
            if let Err(e) = cache
                .put(&hash, url, Some(size as i64), content_type.as_deref(), Some(CACHE_TTL_SECS))
                .await
            {
                warn!(error = %e, "assets cache write failed");
            }
        }

        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_hex() {
        let a = Downloader::content_hash("https://cdn.example/a.mp4");
        let b = Downloader::content_hash("https://cdn.example/a.mp4");
        let c = Downloader::content_hash("https://cdn.example/b.mp4");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
