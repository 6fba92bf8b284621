//! Channel adapter contract

use super::message::{InboundAction, InboundMessage, MessageAttachment, OutboundFile, OutboundMessage};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::RwLock;
use tokio::sync::mpsc;

/// Event emitted by a channel adapter
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Text or file message
    Message(InboundMessage),
    /// Button press
    Action(InboundAction),
    /// Adapter connected
    Connected { channel: String },
    /// Adapter disconnected
    Disconnected { channel: String, reason: String },
    /// Adapter-level error
    Error { channel: String, error: String },
}

/// Messaging gateway used by the bot and the digest
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Channel name
    fn name(&self) -> &str;

    /// Start receiving events
    async fn start(&self, event_tx: mpsc::Sender<ChannelEvent>) -> Result<()>;

    /// Stop receiving events
    async fn stop(&self) -> Result<()>;

    /// Send a message, returning its channel message id
    async fn send_message(&self, message: OutboundMessage) -> Result<String>;

    /// Send a file, returning its channel message id
    async fn send_file(&self, file: OutboundFile) -> Result<String>;

    /// Replace the text of a sent message
    async fn edit_message(&self, chat_id: &str, message_id: &str, content: &str) -> Result<()>;

    /// Delete a sent message
    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()>;

    /// Acknowledge a button press
    async fn answer_action(&self, callback_id: &str) -> Result<()>;

    /// Download the bytes of an inbound attachment
    async fn download_attachment(&self, attachment: &MessageAttachment) -> Result<Vec<u8>>;

    /// Longest text the channel accepts in one message, in characters
    fn max_message_chars(&self) -> usize;

    /// Whether the adapter is running
    fn is_connected(&self) -> bool;
}

/// Adapter lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Shared name and status bookkeeping for adapters
pub struct AdapterBase {
    name: String,
    status: RwLock<AdapterStatus>,
}

impl AdapterBase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: RwLock::new(AdapterStatus::Stopped),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> AdapterStatus {
        self.status
            .read()
            .map(|s| *s)
            .unwrap_or(AdapterStatus::Stopped)
    }

    pub fn set_status(&self, status: AdapterStatus) {
        if let Ok(mut current) = self.status.write() {
            *current = status;
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == AdapterStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_base_status() {
        let base = AdapterBase::new("telegram");
        assert_eq!(base.name(), "telegram");
        assert_eq!(base.status(), AdapterStatus::Stopped);
        assert!(!base.is_running());

        base.set_status(AdapterStatus::Running);
        assert!(base.is_running());
    }
}
