//! Gateway server implementation

use crate::actions::ActionResolver;
use crate::bot::{lane_key, Bot, UserLanes};
use crate::cache::{FileItemCache, ItemCache};
use crate::channels::{ChannelAdapter, ChannelEvent, TelegramAdapter};
use crate::config::JobPilotConfig;
use crate::conversation::SessionStore;
use crate::digest::{DigestRunReport, DigestScheduler};
use crate::documents::{ListingFetcher, PlainTextExtractor};
use crate::error::{Error, Result};
use crate::generation::{AnthropicGenerator, Generator};
use crate::jobs::{HttpJobSource, JobSource};
use crate::profile::{FileProfileStore, ProfileStore};
use crate::workers::WorkerPool;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

const EVENT_QUEUE_CAPACITY: usize = 1000;
const LANE_CAPACITY: usize = 64;
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Gateway server state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    /// Not started
    Stopped,
    /// Starting up
    Starting,
    /// Running
    Running,
    /// Shutting down
    ShuttingDown,
}

/// jobpilot gateway: owns the channel, the bot and the digest loop
pub struct Gateway {
    config: JobPilotConfig,
    state: Arc<RwLock<GatewayState>>,
    channel: Arc<dyn ChannelAdapter>,
    bot: Arc<Bot>,
    digest: Arc<DigestScheduler>,
    sessions: Arc<SessionStore>,
    event_tx: mpsc::Sender<ChannelEvent>,
    event_rx: Arc<RwLock<Option<mpsc::Receiver<ChannelEvent>>>>,
    shutdown: watch::Sender<bool>,
    processor: Mutex<Option<JoinHandle<mpsc::Receiver<ChannelEvent>>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Gateway {
    /// Get current state
    pub async fn state(&self) -> GatewayState {
        *self.state.read().await
    }

    /// Start the gateway
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != GatewayState::Stopped {
            return Err(Error::Gateway("Gateway already running".to_string()));
        }
        *state = GatewayState::Starting;
        drop(state);

        tracing::info!("Starting jobpilot gateway");

        self.shutdown.send_replace(false);
        self.start_event_processor().await;

        if let Err(e) = self.channel.start(self.event_tx.clone()).await {
            self.shutdown.send_replace(true);
            self.join_event_processor().await;
            *self.state.write().await = GatewayState::Stopped;
            return Err(e);
        }

        let mut tasks = self.tasks.lock().await;

        if self.config.digest.enabled {
            tasks.push(self.digest.clone().spawn(self.shutdown.subscribe()));
        }

        if self.config.conversation.idle_timeout_secs.is_some() {
            tasks.push(self.spawn_session_sweeper());
        }
        drop(tasks);

        *self.state.write().await = GatewayState::Running;

        tracing::info!(
            channel = %self.channel.name(),
            digest = self.config.digest.enabled,
            "jobpilot gateway started, daily digest at {:02}:{:02} UTC",
            self.config.digest.hour,
            self.config.digest.minute
        );

        Ok(())
    }

    /// Stop the gateway
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != GatewayState::Running {
            return Ok(());
        }
        *state = GatewayState::ShuttingDown;
        drop(state);

        tracing::info!("Stopping jobpilot gateway");

        self.shutdown.send_replace(true);

        if let Err(e) = self.channel.stop().await {
            tracing::warn!("Failed to stop channel {}: {}", self.channel.name(), e);
        }

        self.join_event_processor().await;

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            match tokio::time::timeout(TASK_JOIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Background task ended abnormally: {}", e),
                Err(_) => tracing::warn!("Background task did not stop in time"),
            }
        }

        *self.state.write().await = GatewayState::Stopped;

        tracing::info!("jobpilot gateway stopped");

        Ok(())
    }

    /// Start the event processor. It hands the receiver back when it
    /// stops so the gateway can be started again.
    async fn start_event_processor(&self) {
        let Some(mut rx) = self.event_rx.write().await.take() else {
            return;
        };
        let bot = self.bot.clone();
        let mut shutdown = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut lanes = UserLanes::new(bot, LANE_CAPACITY);
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Some(event) => Self::handle_event(event, &mut lanes),
                        None => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            lanes.shutdown().await;
            tracing::debug!("Event processor stopped");
            rx
        });
        *self.processor.lock().await = Some(handle);
    }

    /// Wait for the event processor to drain and take its receiver back
    async fn join_event_processor(&self) {
        let Some(handle) = self.processor.lock().await.take() else {
            return;
        };
        match handle.await {
            Ok(rx) => *self.event_rx.write().await = Some(rx),
            Err(e) => tracing::error!("Event processor ended abnormally: {}", e),
        }
    }

    /// Handle a channel event
    fn handle_event(event: ChannelEvent, lanes: &mut UserLanes) {
        if let Some(user_id) = lane_key(&event).map(str::to_string) {
            lanes.dispatch(&user_id, event);
            return;
        }

        match event {
            ChannelEvent::Connected { channel } => {
                tracing::info!("Channel {} connected", channel);
            }
            ChannelEvent::Disconnected { channel, reason } => {
                tracing::warn!("Channel {} disconnected: {}", channel, reason);
            }
            ChannelEvent::Error { channel, error } => {
                tracing::error!("Channel {} error: {}", channel, error);
            }
            other => {
                tracing::debug!("Unhandled event: {:?}", other);
            }
        }
    }

    fn spawn_session_sweeper(&self) -> JoinHandle<()> {
        let sessions = self.sessions.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = sessions.cleanup_idle().await {
                            tracing::warn!("Session cleanup failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Run one digest pass now
    pub async fn run_digest(&self) -> Result<DigestRunReport> {
        self.digest.run_once().await
    }

    /// Run one digest pass on a stopped gateway. The channel runs only for
    /// the duration of the pass; inbound events are dropped.
    pub async fn run_digest_pass(&self) -> Result<DigestRunReport> {
        if self.state().await != GatewayState::Stopped {
            return self.run_digest().await;
        }

        let (tx, _rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        self.channel.start(tx).await?;

        let report = self.digest.run_once().await;

        if let Err(e) = self.channel.stop().await {
            tracing::warn!("Failed to stop channel {}: {}", self.channel.name(), e);
        }
        report
    }

    /// Snapshot for the control API
    pub async fn status(&self) -> GatewayStatus {
        let last_digest = self.digest.last_run().await.map(|(at, report)| LastDigest {
            finished_at: at.to_rfc3339(),
            report,
        });
        GatewayStatus {
            state: format!("{:?}", self.state().await),
            channel: self.channel.name().to_string(),
            connected: self.channel.is_connected(),
            active_sessions: self.sessions.active_count().await,
            digest_enabled: self.config.digest.enabled,
            next_digest: self
                .config
                .digest
                .enabled
                .then(|| self.digest.next_run_after(Utc::now()).to_rfc3339()),
            last_digest,
        }
    }

    /// Get configuration
    pub fn config(&self) -> &JobPilotConfig {
        &self.config
    }

    pub fn channel(&self) -> &Arc<dyn ChannelAdapter> {
        &self.channel
    }

    pub fn bot(&self) -> &Arc<Bot> {
        &self.bot
    }

    /// Get event sender for injecting external events (e.g. webhook updates)
    pub fn event_sender(&self) -> &mpsc::Sender<ChannelEvent> {
        &self.event_tx
    }
}

/// Result of the latest digest run
#[derive(Debug, Clone, Serialize)]
pub struct LastDigest {
    pub finished_at: String,
    pub report: DigestRunReport,
}

/// Gateway status information
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    /// Current state
    pub state: String,
    /// Channel name
    pub channel: String,
    /// Whether the channel adapter is running
    pub connected: bool,
    /// Open conversations
    pub active_sessions: usize,
    pub digest_enabled: bool,
    /// Next scheduled digest (RFC 3339, UTC)
    pub next_digest: Option<String>,
    pub last_digest: Option<LastDigest>,
}

/// Builder for Gateway.
///
/// Collaborators that are not set explicitly are built from the
/// configuration: Telegram channel, HTTP job source, Anthropic generator
/// and file stores under `storage.base_dir`.
pub struct GatewayBuilder {
    config: JobPilotConfig,
    channel: Option<Arc<dyn ChannelAdapter>>,
    job_source: Option<Arc<dyn JobSource>>,
    generator: Option<Arc<dyn Generator>>,
    profiles: Option<Arc<dyn ProfileStore>>,
    cache: Option<Arc<dyn ItemCache>>,
    sessions: Option<Arc<SessionStore>>,
}

impl GatewayBuilder {
    /// Create a new builder with default config
    pub fn new() -> Self {
        Self {
            config: JobPilotConfig::default(),
            channel: None,
            job_source: None,
            generator: None,
            profiles: None,
            cache: None,
            sessions: None,
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: JobPilotConfig) -> Self {
        self.config = config;
        self
    }

    pub fn channel(mut self, channel: Arc<dyn ChannelAdapter>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn job_source(mut self, source: Arc<dyn JobSource>) -> Self {
        self.job_source = Some(source);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn profile_store(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn item_cache(mut self, cache: Arc<dyn ItemCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn session_store(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Build the gateway
    pub async fn build(self) -> Result<Gateway> {
        let config = self.config;
        config.validate()?;

        let channel: Arc<dyn ChannelAdapter> = match self.channel {
            Some(channel) => channel,
            None => Arc::new(TelegramAdapter::new(config.telegram.clone())),
        };
        let job_source: Arc<dyn JobSource> = match self.job_source {
            Some(source) => source,
            None => Arc::new(HttpJobSource::new(config.job_source.clone())?),
        };
        let generator: Arc<dyn Generator> = match self.generator {
            Some(generator) => generator,
            None => Arc::new(AnthropicGenerator::new(config.generation.clone())?),
        };
        let profiles: Arc<dyn ProfileStore> = match self.profiles {
            Some(profiles) => profiles,
            None => Arc::new(FileProfileStore::new(config.storage.profiles_dir()).await?),
        };
        let cache: Arc<dyn ItemCache> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(FileItemCache::new(config.storage.cache_dir()).await?),
        };
        let sessions = match self.sessions {
            Some(sessions) => sessions,
            None => Arc::new(
                SessionStore::open(
                    config.storage.sessions_dir(),
                    config.conversation.idle_timeout_secs,
                )
                .await?,
            ),
        };

        let workers = WorkerPool::new(config.workers.blocking_threads);
        let digest = Arc::new(DigestScheduler::new(
            profiles.clone(),
            cache.clone(),
            job_source,
            channel.clone(),
            workers.clone(),
            config.digest.clone(),
        )?);
        let resolver = ActionResolver::new(
            profiles.clone(),
            cache,
            generator,
            ListingFetcher::new(&config.fetch)?,
            workers.clone(),
        );
        let bot = Arc::new(Bot::new(
            channel.clone(),
            profiles,
            sessions.clone(),
            digest.clone(),
            resolver,
            Arc::new(PlainTextExtractor),
            workers,
        ));

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        Ok(Gateway {
            config,
            state: Arc::new(RwLock::new(GatewayState::Stopped)),
            channel,
            bot,
            digest,
            sessions,
            event_tx,
            event_rx: Arc::new(RwLock::new(Some(event_rx))),
            shutdown,
            processor: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
