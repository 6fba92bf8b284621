//! Per-user event lanes
//!
//! Each user gets one queue and one task. A user's events are handled in
//! arrival order while different users proceed independently. A lane that
//! stays empty for the idle timeout closes and is pruned on the next
//! dispatch.

use super::Bot;
use crate::channels::ChannelEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long an empty lane waits for events before closing
pub const LANE_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Key of the lane an event belongs to; lifecycle events have none
pub fn lane_key(event: &ChannelEvent) -> Option<&str> {
    match event {
        ChannelEvent::Message(message) => Some(&message.sender_id),
        ChannelEvent::Action(action) => Some(&action.sender_id),
        _ => None,
    }
}

struct Lane {
    tx: mpsc::Sender<ChannelEvent>,
    handle: JoinHandle<()>,
}

/// Fan-out of channel events into per-user lanes
pub struct UserLanes {
    bot: Arc<Bot>,
    capacity: usize,
    idle_timeout: Duration,
    lanes: HashMap<String, Lane>,
}

impl UserLanes {
    pub fn new(bot: Arc<Bot>, capacity: usize) -> Self {
        Self {
            bot,
            capacity: capacity.max(1),
            idle_timeout: LANE_IDLE_TIMEOUT,
            lanes: HashMap::new(),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Number of lanes held, including idle lanes not yet pruned
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Queue an event on the user's lane, opening the lane if needed
    pub fn dispatch(&mut self, user_id: &str, event: ChannelEvent) {
        self.prune();

        let (bot, capacity, idle) = (self.bot.clone(), self.capacity, self.idle_timeout);
        let lane = self
            .lanes
            .entry(user_id.to_string())
            .or_insert_with(|| spawn_lane(bot, user_id, capacity, idle));

        match lane.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(user = %user_id, "Lane full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::debug!(user = %user_id, "Lane closed, reopening");
                let lane = spawn_lane(self.bot.clone(), user_id, self.capacity, self.idle_timeout);
                if lane.tx.try_send(event).is_err() {
                    tracing::warn!(user = %user_id, "Dropping event for reopened lane");
                }
                self.lanes.insert(user_id.to_string(), lane);
            }
        }
    }

    /// Drop lanes whose task has ended
    fn prune(&mut self) {
        let before = self.lanes.len();
        self.lanes.retain(|_, lane| !lane.handle.is_finished());
        let pruned = before - self.lanes.len();
        if pruned > 0 {
            tracing::debug!(pruned, open = self.lanes.len(), "Pruned idle lanes");
        }
    }

    /// Close every lane and wait until queued events are handled
    pub async fn shutdown(self) {
        let handles: Vec<JoinHandle<()>> = self
            .lanes
            .into_values()
            .map(|lane| {
                drop(lane.tx);
                lane.handle
            })
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!("Lane task ended abnormally: {}", e);
            }
        }
    }
}

fn spawn_lane(bot: Arc<Bot>, user_id: &str, capacity: usize, idle: Duration) -> Lane {
    let (tx, mut rx) = mpsc::channel::<ChannelEvent>(capacity);
    let user_id = user_id.to_string();

    tracing::debug!(user = %user_id, "Opening lane");

    let handle = tokio::spawn(async move {
        loop {
            match tokio::time::timeout(idle, rx.recv()).await {
                Ok(Some(event)) => handle_logged(&bot, &user_id, event).await,
                Ok(None) => break,
                Err(_) => {
                    // events queued before the close are still handled
                    rx.close();
                    while let Some(event) = rx.recv().await {
                        handle_logged(&bot, &user_id, event).await;
                    }
                    tracing::debug!(user = %user_id, "Closing idle lane");
                    break;
                }
            }
        }
    });

    Lane { tx, handle }
}

async fn handle_logged(bot: &Bot, user_id: &str, event: ChannelEvent) {
    if let Err(e) = bot.handle_event(event).await {
        tracing::error!(user = %user_id, "Error handling event: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::tests::{harness, text};
    use crate::profile::ProfileStore;

    #[tokio::test]
    async fn test_events_of_one_user_stay_ordered() {
        let h = harness();
        let mut lanes = UserLanes::new(h.bot.clone(), 32);

        for content in ["/jobsetup", "Data Analyst", "Berlin", "skip", "ja", "07:45"] {
            lanes.dispatch("42", text("42", content));
        }
        lanes.dispatch("7", text("7", "/start"));
        assert_eq!(lanes.len(), 2);

        lanes.shutdown().await;

        let preference = h
            .profiles
            .get("42")
            .await
            .unwrap()
            .unwrap()
            .search_preference
            .unwrap();
        assert_eq!(preference.location, "Berlin");
        assert!(preference.remote_only);
        assert_eq!((preference.alert_hour, preference.alert_minute), (7, 45));
        assert_eq!(h.channel.texts_to("7").len(), 1);
    }

    #[tokio::test]
    async fn test_failing_event_keeps_lane_alive() {
        let h = harness();
        h.channel.fail_chat("13");
        let mut lanes = UserLanes::new(h.bot.clone(), 8);

        lanes.dispatch("13", text("13", "/start"));
        lanes.dispatch("13", text("13", "/help"));
        lanes.dispatch("14", text("14", "/help"));
        lanes.shutdown().await;

        assert_eq!(h.channel.texts_to("14").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_lanes_are_pruned() {
        let h = harness();
        let mut lanes =
            UserLanes::new(h.bot.clone(), 8).with_idle_timeout(Duration::from_secs(60));

        lanes.dispatch("42", text("42", "/start"));
        lanes.dispatch("7", text("7", "/start"));
        assert_eq!(lanes.len(), 2);

        tokio::time::sleep(Duration::from_secs(61)).await;
        lanes.dispatch("7", text("7", "/help"));
        assert_eq!(lanes.len(), 1);

        lanes.shutdown().await;
        assert_eq!(h.channel.texts_to("7").len(), 2);
        assert_eq!(h.channel.texts_to("42").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_lane_stays_open() {
        let h = harness();
        let mut lanes =
            UserLanes::new(h.bot.clone(), 8).with_idle_timeout(Duration::from_secs(60));

        for _ in 0..3 {
            lanes.dispatch("42", text("42", "/help"));
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        assert_eq!(lanes.len(), 1);

        lanes.shutdown().await;
        assert_eq!(h.channel.texts_to("42").len(), 3);
    }

    #[test]
    fn test_lane_key() {
        assert_eq!(lane_key(&text("42", "hi")), Some("42"));
        assert_eq!(
            lane_key(&ChannelEvent::Connected {
                channel: "telegram".to_string()
            }),
            None
        );
    }
}
