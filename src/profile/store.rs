//! Profile persistence
//!
//! Profiles are persisted as JSON files under `<base_dir>/profiles/`, one
//! file per user. Writes go through a temp file and rename.

use crate::error::Result;
use crate::profile::types::UserProfile;
use crate::storage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keyed store of user profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Load a user's profile, `None` if the user has none yet
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Replace a user's profile
    async fn put(&self, user_id: &str, profile: &UserProfile) -> Result<()>;

    /// All user ids with a stored profile
    async fn list_user_ids(&self) -> Result<Vec<String>>;

    /// Load a profile or start from an empty one
    async fn get_or_default(&self, user_id: &str) -> Result<UserProfile> {
        Ok(self.get(user_id).await?.unwrap_or_default())
    }
}

/// Outcome of the alert toggle command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertToggle {
    Enabled,
    Disabled,
    /// No search preference saved yet, nothing changed
    MissingPreference,
}

/// Flip the daily digest toggle for a user
pub async fn toggle_alert(store: &dyn ProfileStore, user_id: &str) -> Result<AlertToggle> {
    let mut profile = store.get_or_default(user_id).await?;
    if profile.search_preference.is_none() {
        return Ok(AlertToggle::MissingPreference);
    }

    profile.alert_enabled = !profile.alert_enabled;
    store.put(user_id, &profile).await?;

    tracing::info!(user = %user_id, enabled = profile.alert_enabled, "Alert toggled");

    Ok(if profile.alert_enabled {
        AlertToggle::Enabled
    } else {
        AlertToggle::Disabled
    })
}

/// File-backed profile store
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    /// Open a store, creating the directory if needed
    pub async fn new(dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Storage directory
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let path = storage::user_file(&self.dir, user_id)?;
        match storage::read_json(&path).await {
            Ok(profile) => Ok(profile),
            Err(crate::Error::Serialization(e)) => {
                tracing::warn!("Ignoring corrupt profile {}: {}", path.display(), e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn put(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        let path = storage::user_file(&self.dir, user_id)?;
        storage::write_json(&path, profile).await?;
        tracing::debug!(user = %user_id, "Profile saved");
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<String>> {
        storage::list_user_ids(&self.dir).await
    }
}

/// In-memory profile store
#[derive(Default, Clone)]
pub struct MemoryProfileStore {
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
    writes: Arc<std::sync::atomic::AtomicUsize>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls
    pub fn write_count(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn put(&self, user_id: &str, profile: &UserProfile) -> Result<()> {
        storage::validate_user_id(user_id)?;
        self.profiles
            .write()
            .await
            .insert(user_id.to_string(), profile.clone());
        self.writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn list_user_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.profiles.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::types::JobPreference;
    use tempfile::TempDir;

    async fn make_store() -> (FileProfileStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileProfileStore::new(dir.path().join("profiles"))
            .await
            .unwrap();
        (store, dir)
    }

    fn preference() -> JobPreference {
        JobPreference {
            role_title: "Backend Engineer".to_string(),
            location: "Hamburg".to_string(),
            keywords: "Rust".to_string(),
            remote_only: true,
            alert_hour: 8,
            alert_minute: 15,
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (store, _dir) = make_store().await;
        assert!(store.get("1").await.unwrap().is_none());
        assert_eq!(store.get_or_default("1").await.unwrap(), UserProfile::default());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (store, _dir) = make_store().await;
        let profile = UserProfile {
            reference_document: Some("CV".to_string()),
            search_preference: Some(preference()),
            ..Default::default()
        };

        store.put("1001", &profile).await.unwrap();
        assert_eq!(store.get("1001").await.unwrap(), Some(profile));
        assert_eq!(store.list_user_ids().await.unwrap(), vec!["1001"]);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("profiles");
        {
            let store = FileProfileStore::new(path.clone()).await.unwrap();
            let profile = UserProfile {
                alert_enabled: true,
                ..Default::default()
            };
            store.put("7", &profile).await.unwrap();
        }

        let store = FileProfileStore::new(path).await.unwrap();
        assert!(store.get("7").await.unwrap().unwrap().alert_enabled);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_missing() {
        let (store, _dir) = make_store().await;
        std::fs::write(store.dir().join("5.json"), "{not json").unwrap();
        assert!(store.get("5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_unsafe_user_id() {
        let (store, _dir) = make_store().await;
        let result = store.put("../x", &UserProfile::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_toggle_alert_needs_preference() {
        let store = MemoryProfileStore::new();
        let outcome = toggle_alert(&store, "1").await.unwrap();
        assert_eq!(outcome, AlertToggle::MissingPreference);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_toggle_alert_flips() {
        let store = MemoryProfileStore::new();
        let profile = UserProfile {
            search_preference: Some(preference()),
            ..Default::default()
        };
        store.put("1", &profile).await.unwrap();

        assert_eq!(toggle_alert(&store, "1").await.unwrap(), AlertToggle::Enabled);
        assert!(store.get("1").await.unwrap().unwrap().alert_enabled);
        assert_eq!(toggle_alert(&store, "1").await.unwrap(), AlertToggle::Disabled);
        assert!(!store.get("1").await.unwrap().unwrap().alert_enabled);
    }

    #[tokio::test]
    async fn test_memory_store_lists_sorted() {
        let store = MemoryProfileStore::new();
        store.put("b", &UserProfile::default()).await.unwrap();
        store.put("a", &UserProfile::default()).await.unwrap();
        assert_eq!(store.list_user_ids().await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.write_count(), 2);
    }
}
