//! Active conversation sessions
//!
//! At most one session per user. Sessions are kept in memory and, when a
//! directory is configured, checkpointed to `sessions/<user_id>.json` after
//! every accepted input so an unfinished dialog survives a restart.

use super::engine::{Answers, FlowKind};
use crate::error::Result;
use crate::storage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// One user's position in one flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub user_id: String,
    pub flow: FlowKind,
    pub current_state: String,
    #[serde(default)]
    pub answers: Answers,
    /// Unix milliseconds
    pub started_at: i64,
    /// Unix milliseconds of the last accepted input
    pub updated_at: i64,
}

impl ConversationSession {
    pub fn new(user_id: &str, flow: FlowKind, initial_state: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            user_id: user_id.to_string(),
            flow,
            current_state: initial_state.to_string(),
            answers: Answers::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Record activity
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    fn idle_ms(&self, now: i64) -> i64 {
        now - self.updated_at
    }
}

/// Session registry with optional checkpoint files
pub struct SessionStore {
    dir: Option<PathBuf>,
    idle_timeout_ms: Option<i64>,
    sessions: RwLock<HashMap<String, ConversationSession>>,
}

impl SessionStore {
    /// In-memory store without checkpoints
    pub fn in_memory(idle_timeout_secs: Option<u64>) -> Self {
        Self {
            dir: None,
            idle_timeout_ms: idle_timeout_secs.map(|s| s as i64 * 1000),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Store checkpointing into `dir`; existing checkpoints are loaded
    pub async fn open(dir: PathBuf, idle_timeout_secs: Option<u64>) -> Result<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        let store = Self {
            dir: Some(dir),
            ..Self::in_memory(idle_timeout_secs)
        };
        let restored = store.load_checkpoints().await?;
        if restored > 0 {
            tracing::info!(count = restored, "Restored conversation sessions");
        }
        Ok(store)
    }

    async fn load_checkpoints(&self) -> Result<usize> {
        let Some(dir) = &self.dir else {
            return Ok(0);
        };

        let mut sessions = self.sessions.write().await;
        for user_id in storage::list_user_ids(dir).await? {
            let path = storage::user_file(dir, &user_id)?;
            match storage::read_json::<ConversationSession>(&path).await {
                Ok(Some(session)) if session.user_id == user_id => {
                    sessions.insert(user_id, session);
                }
                Ok(_) => {
                    tracing::warn!("Skipping mismatched session checkpoint {}", path.display());
                }
                Err(e) => {
                    tracing::warn!("Skipping corrupt session checkpoint {}: {}", path.display(), e);
                }
            }
        }
        Ok(sessions.len())
    }

    /// Current session of a user, if any and not expired
    pub async fn checkout(&self, user_id: &str) -> Result<Option<ConversationSession>> {
        let session = self.sessions.read().await.get(user_id).cloned();
        let Some(session) = session else {
            return Ok(None);
        };

        if let Some(timeout) = self.idle_timeout_ms {
            if session.idle_ms(chrono::Utc::now().timestamp_millis()) > timeout {
                tracing::debug!(user = %user_id, "Conversation expired");
                self.discard(user_id).await?;
                return Ok(None);
            }
        }
        Ok(Some(session))
    }

    /// Store a session, replacing any other session of the same user
    pub async fn checkin(&self, session: ConversationSession) -> Result<()> {
        if let Some(dir) = &self.dir {
            let path = storage::user_file(dir, &session.user_id)?;
            storage::write_json(&path, &session).await?;
        }
        self.sessions
            .write()
            .await
            .insert(session.user_id.clone(), session);
        Ok(())
    }

    /// Drop a user's session and its checkpoint
    pub async fn discard(&self, user_id: &str) -> Result<()> {
        self.sessions.write().await.remove(user_id);
        if let Some(dir) = &self.dir {
            storage::remove_file(&storage::user_file(dir, user_id)?).await?;
        }
        Ok(())
    }

    /// Number of open sessions
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Discard sessions idle for longer than the configured timeout
    pub async fn cleanup_idle(&self) -> Result<usize> {
        let Some(timeout) = self.idle_timeout_ms else {
            return Ok(0);
        };
        let now = chrono::Utc::now().timestamp_millis();
        let expired: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|s| s.idle_ms(now) > timeout)
                .map(|s| s.user_id.clone())
                .collect()
        };

        let mut cleaned = 0;
        for user_id in expired {
            if let Err(e) = self.discard(&user_id).await {
                tracing::warn!("Failed to discard session of {}: {}", user_id, e);
            } else {
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            tracing::info!("Cleaned up {} idle conversations", cleaned);
        }

        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ConversationEngine, ConversationInput, FlowDefaults, Step};
    use crate::profile::{MemoryProfileStore, ProfileStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_checkin_checkout_discard() {
        let store = SessionStore::in_memory(None);
        assert!(store.checkout("1").await.unwrap().is_none());

        store
            .checkin(ConversationSession::new("1", FlowKind::Preferences, "role_title"))
            .await
            .unwrap();
        assert_eq!(store.active_count().await, 1);
        assert_eq!(
            store.checkout("1").await.unwrap().unwrap().current_state,
            "role_title"
        );

        store.discard("1").await.unwrap();
        assert!(store.checkout("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_flow_replaces_active_session() {
        let store = SessionStore::in_memory(None);
        store
            .checkin(ConversationSession::new("1", FlowKind::Preferences, "location"))
            .await
            .unwrap();
        store
            .checkin(ConversationSession::new("1", FlowKind::Documents, "choice"))
            .await
            .unwrap();

        let session = store.checkout("1").await.unwrap().unwrap();
        assert_eq!(session.flow, FlowKind::Documents);
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_idle_session_expires() {
        let store = SessionStore::in_memory(Some(60));
        let mut session = ConversationSession::new("1", FlowKind::Documents, "choice");
        session.updated_at -= 61_000;
        store.checkin(session).await.unwrap();
        store
            .checkin(ConversationSession::new("2", FlowKind::Documents, "choice"))
            .await
            .unwrap();

        assert_eq!(store.cleanup_idle().await.unwrap(), 1);
        assert!(store.checkout("1").await.unwrap().is_none());
        assert!(store.checkout("2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_resume_after_restart() {
        let dir = TempDir::new().unwrap();
        let profiles = MemoryProfileStore::new();
        let engine = ConversationEngine::new(Arc::new(profiles.clone()), FlowDefaults::default());

        {
            let store = SessionStore::open(dir.path().to_path_buf(), None).await.unwrap();
            let (mut session, _) = engine
                .start(crate::conversation::FlowKind::Preferences, "42")
                .unwrap();
            for input in ["Data Analyst", "Berlin"] {
                engine
                    .advance(&mut session, ConversationInput::from_text(input))
                    .await
                    .unwrap();
            }
            store.checkin(session).await.unwrap();
        }

        let store = SessionStore::open(dir.path().to_path_buf(), None).await.unwrap();
        let mut session = store.checkout("42").await.unwrap().unwrap();
        assert_eq!(session.current_state, "keywords");

        for input in ["skip", "nein"] {
            engine
                .advance(&mut session, ConversationInput::from_text(input))
                .await
                .unwrap();
        }
        let step = engine
            .advance(&mut session, ConversationInput::from_text("ok"))
            .await
            .unwrap();
        assert!(matches!(step, Step::Completed(_)));
        store.discard("42").await.unwrap();

        let pref = profiles.get("42").await.unwrap().unwrap().search_preference.unwrap();
        assert_eq!(pref.role_title, "Data Analyst");
        assert_eq!(pref.location, "Berlin");
        assert!(!dir.path().join("42.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("5.json"), "nope").unwrap();
        let store = SessionStore::open(dir.path().to_path_buf(), None).await.unwrap();
        assert_eq!(store.active_count().await, 0);
    }
}
