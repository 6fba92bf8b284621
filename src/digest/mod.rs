//! Daily job digest
//!
//! Once a day at the configured UTC time every user with the alert switched
//! on and saved preferences gets a fresh batch of postings. The batch
//! replaces the user's posting cache so the buttons under the notices
//! resolve against it. `/suchenow` uses the same delivery path on demand.

mod notices;

pub use notices::select_postings;

use crate::cache::ItemCache;
use crate::channels::{ChannelAdapter, OutboundMessage};
use crate::config::DigestConfig;
use crate::error::{Error, Result};
use crate::jobs::{JobPosting, JobSource};
use crate::profile::{JobPreference, ProfileStore};
use crate::workers::WorkerPool;
use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

/// Result of delivering one batch to one user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOutcome {
    /// Header plus this many posting notices were sent
    Delivered(usize),
    /// Nothing found; the "no results" notice was sent
    Empty,
}

/// Summary of one scheduled run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DigestRunReport {
    /// Users with the alert on and preferences saved
    pub eligible: usize,
    /// Users who received postings
    pub delivered: usize,
    /// Users told that nothing was found
    pub empty: usize,
    /// Users whose delivery failed
    pub failed: usize,
}

/// Daily digest scheduler
pub struct DigestScheduler {
    profiles: Arc<dyn ProfileStore>,
    cache: Arc<dyn ItemCache>,
    source: Arc<dyn JobSource>,
    channel: Arc<dyn ChannelAdapter>,
    workers: WorkerPool,
    config: DigestConfig,
    schedule: Schedule,
    last_run: RwLock<Option<(DateTime<Utc>, DigestRunReport)>>,
}

impl DigestScheduler {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        cache: Arc<dyn ItemCache>,
        source: Arc<dyn JobSource>,
        channel: Arc<dyn ChannelAdapter>,
        workers: WorkerPool,
        config: DigestConfig,
    ) -> Result<Self> {
        let schedule = daily_schedule(config.hour, config.minute)?;
        Ok(Self {
            profiles,
            cache,
            source,
            channel,
            workers,
            config,
            schedule,
            last_run: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Time and report of the most recent run
    pub async fn last_run(&self) -> Option<(DateTime<Utc>, DigestRunReport)> {
        self.last_run.read().await.clone()
    }

    /// First trigger time strictly after `now`
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        next_trigger(&self.schedule, now)
    }

    /// Query the job source on the worker pool. A failing search counts as
    /// an empty result.
    pub async fn search(&self, preference: &JobPreference) -> Vec<JobPosting> {
        let source = self.source.clone();
        let query = preference.clone();
        match self
            .workers
            .run("job_search", move || source.search(&query))
            .await
        {
            Ok(Ok(postings)) => postings,
            Ok(Err(e)) | Err(e) => {
                tracing::warn!(
                    term = %preference.search_term(),
                    location = %preference.location,
                    "Job search failed: {}",
                    e
                );
                Vec::new()
            }
        }
    }

    /// Deliver a batch to one user: replace the cache, then send a header
    /// and one notice per posting, paced
    pub async fn deliver_postings(
        &self,
        user_id: &str,
        postings: Vec<JobPosting>,
    ) -> Result<DigestOutcome> {
        let channel = self.channel.name().to_string();
        let selected = select_postings(postings, self.config.max_postings);

        if selected.is_empty() {
            self.channel
                .send_message(OutboundMessage::new(&channel, user_id, notices::NO_RESULTS))
                .await?;
            return Ok(DigestOutcome::Empty);
        }

        self.cache.replace(user_id, &selected).await?;

        self.channel
            .send_message(OutboundMessage::new(
                &channel,
                user_id,
                &notices::header(selected.len(), Utc::now()),
            ))
            .await?;

        let pacing = Duration::from_millis(self.config.pacing_ms);
        for (index, posting) in selected.iter().enumerate() {
            tokio::time::sleep(pacing).await;
            self.channel
                .send_message(notices::posting_notice(&channel, user_id, index + 1, posting))
                .await?;
        }

        tracing::debug!(user = %user_id, count = selected.len(), "Digest delivered");
        Ok(DigestOutcome::Delivered(selected.len()))
    }

    /// Search and deliver for one user
    pub async fn run_for_user(
        &self,
        user_id: &str,
        preference: &JobPreference,
    ) -> Result<DigestOutcome> {
        let searching = OutboundMessage::new(self.channel.name(), user_id, notices::SEARCHING);
        if let Err(e) = self.channel.send_message(searching).await {
            tracing::debug!(user = %user_id, "Searching notice not sent: {}", e);
        }

        let postings = self.search(preference).await;
        self.deliver_postings(user_id, postings).await
    }

    /// Run the digest for every eligible user. One user's failure never
    /// stops the others.
    pub async fn run_once(&self) -> Result<DigestRunReport> {
        tracing::info!("Daily job digest starting");
        let mut report = DigestRunReport::default();

        for user_id in self.profiles.list_user_ids().await? {
            let profile = match self.profiles.get(&user_id).await {
                Ok(Some(profile)) => profile,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(user = %user_id, "Failed to load profile: {}", e);
                    report.failed += 1;
                    continue;
                }
            };
            if !profile.eligible_for_digest() {
                continue;
            }
            let Some(preference) = profile.search_preference else {
                continue;
            };

            report.eligible += 1;
            match self.run_for_user(&user_id, &preference).await {
                Ok(DigestOutcome::Delivered(_)) => report.delivered += 1,
                Ok(DigestOutcome::Empty) => report.empty += 1,
                Err(e) => {
                    tracing::error!(user = %user_id, "Digest failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            eligible = report.eligible,
            delivered = report.delivered,
            empty = report.empty,
            failed = report.failed,
            "Daily job digest finished"
        );
        *self.last_run.write().await = Some((Utc::now(), report.clone()));
        Ok(report)
    }

    /// Run the digest daily until `shutdown` turns true
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }

                let now = Utc::now();
                let next = self.next_run_after(now);
                let wait = (next - now).to_std().unwrap_or_default();
                tracing::info!(next = %next, "Next digest run scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if let Err(e) = self.run_once().await {
                            tracing::error!("Digest run failed: {}", e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Digest scheduler stopped");
        })
    }
}

/// Cron schedule firing every day at `hour:minute` UTC
fn daily_schedule(hour: u8, minute: u8) -> Result<Schedule> {
    let expression = format!("0 {} {} * * *", minute, hour);
    Schedule::from_str(&expression)
        .map_err(|e| Error::Config(format!("invalid digest time '{}': {}", expression, e)))
}

fn next_trigger(schedule: &Schedule, now: DateTime<Utc>) -> DateTime<Utc> {
    schedule
        .after(&now)
        .next()
        .unwrap_or_else(|| now + chrono::Duration::days(1))
}
