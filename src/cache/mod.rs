//! Per-user cache of the most recent posting batch
//!
//! Each digest or on-demand search replaces the user's whole batch. A button
//! press carries only the posting id, so the id must resolve against the
//! current batch; ids from earlier batches are stale.

use crate::error::Result;
use crate::jobs::JobPosting;
use crate::storage;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Stable posting id: first 16 hex chars of SHA-256 over the
/// length-prefixed title, company and url.
///
/// Length prefixes keep `("ab", "c")` and `("a", "bc")` apart.
pub fn job_id(title: &str, company: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [title, company, url] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

/// Keyed cache of the latest batch per user
#[async_trait]
pub trait ItemCache: Send + Sync {
    /// Replace the user's batch. Ids absent from `postings` stop resolving.
    async fn replace(&self, user_id: &str, postings: &[JobPosting]) -> Result<()>;

    /// Look up a posting in the user's current batch
    async fn get(&self, user_id: &str, item_id: &str) -> Result<Option<JobPosting>>;
}

fn index(postings: &[JobPosting]) -> HashMap<String, JobPosting> {
    postings.iter().map(|p| (p.id(), p.clone())).collect()
}

/// File-backed cache, one JSON map per user
pub struct FileItemCache {
    dir: PathBuf,
}

impl FileItemCache {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl ItemCache for FileItemCache {
    async fn replace(&self, user_id: &str, postings: &[JobPosting]) -> Result<()> {
        let path = storage::user_file(&self.dir, user_id)?;
        storage::write_json(&path, &index(postings)).await?;
        tracing::debug!(user = %user_id, count = postings.len(), "Cache replaced");
        Ok(())
    }

    async fn get(&self, user_id: &str, item_id: &str) -> Result<Option<JobPosting>> {
        let path = storage::user_file(&self.dir, user_id)?;
        let batch: Option<HashMap<String, JobPosting>> = match storage::read_json(&path).await {
            Ok(batch) => batch,
            Err(crate::Error::Serialization(e)) => {
                tracing::warn!("Ignoring corrupt cache {}: {}", path.display(), e);
                None
            }
            Err(e) => return Err(e),
        };
        Ok(batch.and_then(|mut b| b.remove(item_id)))
    }
}

/// In-memory cache
#[derive(Default, Clone)]
pub struct MemoryItemCache {
    batches: Arc<RwLock<HashMap<String, HashMap<String, JobPosting>>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryItemCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `replace` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Size of the user's current batch
    pub async fn batch_len(&self, user_id: &str) -> usize {
        self.batches
            .read()
            .await
            .get(user_id)
            .map(|b| b.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ItemCache for MemoryItemCache {
    async fn replace(&self, user_id: &str, postings: &[JobPosting]) -> Result<()> {
        self.batches
            .write()
            .await
            .insert(user_id.to_string(), index(postings));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, user_id: &str, item_id: &str) -> Result<Option<JobPosting>> {
        Ok(self
            .batches
            .read()
            .await
            .get(user_id)
            .and_then(|b| b.get(item_id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn posting(n: usize) -> JobPosting {
        JobPosting {
            title: format!("Job {}", n),
            company: "ACME".to_string(),
            url: format!("https://jobs.example/{}", n),
            ..Default::default()
        }
    }

    #[test]
    fn test_job_id_is_deterministic() {
        let a = job_id("Dev", "ACME", "https://x/1");
        assert_eq!(a, job_id("Dev", "ACME", "https://x/1"));
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_job_id_is_lowercase_hex_prefix() {
        assert_eq!(
            job_id("Data Analyst", "ACME", "https://jobs.example.com/1"),
            "a884b3f9d243d97e"
        );
    }

    #[test]
    fn test_job_id_depends_on_each_field() {
        let base = job_id("Dev", "ACME", "https://x/1");
        assert_ne!(base, job_id("Dev2", "ACME", "https://x/1"));
        assert_ne!(base, job_id("Dev", "ACME2", "https://x/1"));
        assert_ne!(base, job_id("Dev", "ACME", "https://x/2"));
    }

    #[test]
    fn test_job_id_ignores_other_fields() {
        let mut a = posting(1);
        let mut b = posting(1);
        a.description = "one".to_string();
        b.description = "two".to_string();
        b.location = "Berlin".to_string();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_job_id_field_boundaries() {
        assert_ne!(job_id("ab", "c", ""), job_id("a", "bc", ""));
    }

    #[tokio::test]
    async fn test_file_cache_replace_is_total() {
        let dir = TempDir::new().unwrap();
        let cache = FileItemCache::new(dir.path().join("cache")).await.unwrap();

        let first = vec![posting(1), posting(2)];
        cache.replace("9", &first).await.unwrap();
        let old_id = first[0].id();
        assert_eq!(cache.get("9", &old_id).await.unwrap(), Some(posting(1)));

        cache.replace("9", &[posting(3)]).await.unwrap();
        assert!(cache.get("9", &old_id).await.unwrap().is_none());
        assert!(cache.get("9", &posting(3).id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_cache_missing_user() {
        let dir = TempDir::new().unwrap();
        let cache = FileItemCache::new(dir.path().to_path_buf()).await.unwrap();
        assert!(cache.get("1", "abcdef").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_caches_are_per_user() {
        let cache = MemoryItemCache::new();
        cache.replace("a", &[posting(1)]).await.unwrap();
        assert!(cache.get("b", &posting(1).id()).await.unwrap().is_none());
        assert_eq!(cache.batch_len("a").await, 1);
        assert_eq!(cache.write_count(), 1);
    }
}
