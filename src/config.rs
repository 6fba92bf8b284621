//! jobpilot configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main jobpilot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobPilotConfig {
    /// Telegram channel configuration
    pub telegram: TelegramConfig,

    /// Daily digest configuration
    pub digest: DigestConfig,

    /// Job source configuration
    pub job_source: JobSourceConfig,

    /// Cover letter generation configuration
    pub generation: GenerationConfig,

    /// Job link fetching configuration
    pub fetch: FetchConfig,

    /// Conversation flow configuration
    pub conversation: ConversationConfig,

    /// Blocking worker pool configuration
    pub workers: WorkerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// HTTP control API configuration
    pub api: ApiConfig,
}

impl JobPilotConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.digest.hour > 23 || self.digest.minute > 59 {
            return Err(Error::Config(format!(
                "digest time {:02}:{:02} is out of range",
                self.digest.hour, self.digest.minute
            )));
        }
        if self.digest.max_postings == 0 {
            return Err(Error::Config(
                "digest.max_postings must be at least 1".to_string(),
            ));
        }
        if self.workers.blocking_threads == 0 {
            return Err(Error::Config(
                "workers.blocking_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve a secret from the environment variable named by `credential_ref`.
///
/// Tries the exact name first, then the UPPER_CASE form.
pub fn resolve_credential(credential_ref: &str) -> Result<String> {
    std::env::var(credential_ref)
        .or_else(|_| std::env::var(credential_ref.to_uppercase()))
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "Failed to resolve credential from env var: {}",
                credential_ref
            ))
        })
}

/// Telegram channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Environment variable holding the bot token
    pub bot_token_ref: String,

    /// Allowed user IDs (empty = everyone)
    pub allowed_users: Vec<i64>,

    /// Bot API base URL
    pub api_base: String,

    /// Receive updates via long polling. Disable when updates are pushed
    /// through `TelegramAdapter::process_update` (webhook mode).
    pub long_polling: bool,

    /// Long polling timeout in seconds
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_ref: "TELEGRAM_TOKEN".to_string(),
            allowed_users: Vec::new(),
            api_base: "https://api.telegram.org".to_string(),
            long_polling: true,
            poll_timeout_secs: 30,
        }
    }
}

/// Daily digest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Run the daily digest
    pub enabled: bool,

    /// Trigger hour (UTC)
    pub hour: u8,

    /// Trigger minute (UTC)
    pub minute: u8,

    /// Maximum postings delivered per user and run
    pub max_postings: usize,

    /// Minimum delay between outbound notices in milliseconds
    pub pacing_ms: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 6,
            minute: 0,
            max_postings: 10,
            pacing_ms: 300,
        }
    }
}

/// Job source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSourceConfig {
    /// Search endpoint of the scraper service
    pub endpoint: String,

    /// Job boards to query
    pub sites: Vec<String>,

    /// Number of postings requested per search
    pub results_wanted: usize,

    /// Maximum posting age in hours
    pub hours_old: u32,

    /// Country hint for boards that need one
    pub country: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Environment variable holding an optional bearer token
    pub api_key_ref: Option<String>,
}

impl Default for JobSourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8088/search".to_string(),
            sites: vec!["linkedin".to_string(), "indeed".to_string()],
            results_wanted: 20,
            hours_old: 48,
            country: "Germany".to_string(),
            timeout_secs: 90,
            api_key_ref: None,
        }
    }
}

/// Cover letter generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Environment variable holding the API key
    pub api_key_ref: String,

    /// API base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Output token budget
    pub max_tokens: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key_ref: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 2048,
            timeout_secs: 120,
        }
    }
}

/// Job link fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum characters of listing text kept
    pub max_chars: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            max_chars: 12_000,
        }
    }
}

/// Conversation flow configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Discard sessions idle for longer than this (None = never)
    pub idle_timeout_secs: Option<u64>,
}

/// Blocking worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum concurrent blocking collaborator calls
    pub blocking_threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { blocking_threads: 4 }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for profiles, caches and session checkpoints
    pub base_dir: PathBuf,
}

impl StorageConfig {
    /// Directory of durable user profiles
    pub fn profiles_dir(&self) -> PathBuf {
        self.base_dir.join("profiles")
    }

    /// Directory of per-user posting caches
    pub fn cache_dir(&self) -> PathBuf {
        self.base_dir.join("cache")
    }

    /// Directory of conversation checkpoints
    pub fn sessions_dir(&self) -> PathBuf {
        self.base_dir.join("sessions")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: dirs_next::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("jobpilot"),
        }
    }
}

/// HTTP control API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Serve the control API
    pub enabled: bool,

    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 18791,
        }
    }
}
