//! Content-addressed retrieval cache
//!
//! Every fetched URL is stored as one file named after the MD5 digest of the
//! URL. The file modification time is the freshness timestamp; no other
//! metadata is kept.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};
use md5::{Digest, Md5};
use reqwest::Client;

use crate::utils::http::{build_client, web_get_bytes, FetchError};

/// Per-process sequence for temp file names
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Freshness of a cache entry relative to the current clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No entry on disk
    Missing,
    /// Stored timestamp lies in the future (clock rollback); served as-is
    FromFuture,
    /// Within the time-to-live
    Fresh,
    /// Older than the time-to-live
    Expired,
}

/// Shared on-disk cache in front of upstream HTTP fetches
#[derive(Debug, Clone)]
pub struct RetrievalCache {
    cache_dir: PathBuf,
    client: Client,
}

impl RetrievalCache {
    /// Create a cache rooted at `cache_dir`; the directory is created on first write
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, FetchError> {
        Ok(Self::with_client(cache_dir, build_client()?))
    }

    pub fn with_client(cache_dir: impl Into<PathBuf>, client: Client) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            client,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the entry for `url`
    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(cache_key(url))
    }

    /// Classify the entry for `url` against `ttl`
    pub async fn state(&self, url: &str, ttl: Duration) -> CacheState {
        let path = self.cache_path(url);
        let modified = match tokio::fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return CacheState::Missing,
        };
        classify(modified, SystemTime::now(), ttl)
    }

    /// Return the body of `url`, from cache when possible
    ///
    /// An entry whose timestamp lies in the future is served regardless of
    /// `ttl`, so a clock rollback cannot make every entry refetch at once.
    pub async fn retrieve(&self, url: &str, ttl: Duration) -> Result<Vec<u8>, FetchError> {
        let path = self.cache_path(url);
        match self.state(url, ttl).await {
            CacheState::FromFuture => {
                warn!(
                    "Cache entry for {} is timestamped in the future, serving it as-is",
                    url
                );
                return Ok(tokio::fs::read(&path).await?);
            }
            CacheState::Fresh => {
                debug!("Cache hit for {}", url);
                return Ok(tokio::fs::read(&path).await?);
            }
            CacheState::Expired | CacheState::Missing => {}
        }

        info!("Fetching {}", url);
        let body = web_get_bytes(&self.client, url).await?;
        self.store(&path, &body).await?;
        Ok(body)
    }

    async fn store(&self, path: &Path, body: &[u8]) -> Result<(), FetchError> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;

        // Write to a sibling and rename so readers never see a partial body.
        // Concurrent writers of one key each get their own sibling; the last
        // rename wins.
        let tmp = temp_path(path);
        tokio::fs::write(&tmp, body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!("Stored {} bytes at {}", body.len(), path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_extension(format!("tmp-{}-{}", std::process::id(), seq))
}

/// MD5 hex digest of the URL, used as the cache file name
pub fn cache_key(url: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn classify(modified: SystemTime, now: SystemTime, ttl: Duration) -> CacheState {
    match now.duration_since(modified) {
        Err(_) => CacheState::FromFuture,
        Ok(age) if age < ttl => CacheState::Fresh,
        Ok(_) => CacheState::Expired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_md5_of_url() {
        assert_eq!(cache_key(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(cache_key("https://a/sub"), cache_key("https://a/sub"));
        assert_ne!(cache_key("https://a/sub"), cache_key("https://b/sub"));
    }

    #[test]
    fn test_classify() {
        let now = SystemTime::now();
        let ttl = Duration::from_secs(60);
        assert_eq!(classify(now, now, ttl), CacheState::Fresh);
        assert_eq!(
            classify(now - Duration::from_secs(61), now, ttl),
            CacheState::Expired
        );
        assert_eq!(
            classify(now + Duration::from_secs(3600), now, ttl),
            CacheState::FromFuture
        );
    }

    #[test]
    fn test_cache_path_under_dir() {
        let cache = RetrievalCache::with_client("/tmp/submerge", Client::new());
        assert_eq!(
            cache.cache_path(""),
            PathBuf::from("/tmp/submerge/d41d8cd98f00b204e9800998ecf8427e")
        );
    }

    #[test]
    fn test_temp_paths_are_unique() {
        let path = PathBuf::from("/tmp/submerge/d41d8cd98f00b204e9800998ecf8427e");
        let first = temp_path(&path);
        let second = temp_path(&path);
        assert_ne!(first, second);
        assert_eq!(first.parent(), path.parent());
    }

    #[tokio::test]
    async fn test_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RetrievalCache::with_client(dir.path(), Client::new());
        assert_eq!(
            cache.state("https://a/sub", Duration::from_secs(60)).await,
            CacheState::Missing
        );
    }
}
