//! Channel message types

use serde::{Deserialize, Serialize};

/// Message received from a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel name (e.g. "telegram")
    pub channel: String,
    /// Sender's user id on the channel
    pub sender_id: String,
    /// Chat to reply into
    pub chat_id: String,
    /// Text or caption, possibly empty
    pub content: String,
    /// Attached file, if any
    pub attachment: Option<MessageAttachment>,
    /// Channel-specific message id
    pub channel_message_id: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

impl InboundMessage {
    /// Create a text message stamped with the current time
    pub fn new(channel: &str, sender_id: &str, chat_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            sender_id: sender_id.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            attachment: None,
            channel_message_id: String::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Attach a file
    pub fn with_attachment(mut self, attachment: MessageAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// File attached to an inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttachment {
    /// Channel handle used to download the file
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

/// Button press on a message sent earlier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundAction {
    pub channel: String,
    pub sender_id: String,
    pub chat_id: String,
    /// Opaque payload attached to the button
    pub data: String,
    /// Id used to acknowledge the press
    pub callback_id: String,
    /// Message carrying the button
    pub message_id: Option<String>,
}

/// Where a button leads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    /// Sent back as an [`InboundAction`] with this payload
    Callback(String),
    /// Opens a URL on the client
    Url(String),
}

/// One button under an outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAction {
    pub label: String,
    pub target: ActionTarget,
}

impl MessageAction {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: ActionTarget::Callback(data.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: ActionTarget::Url(url.into()),
        }
    }
}

/// Message to send to a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub chat_id: String,
    pub content: String,
    /// Button rows rendered under the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Vec<MessageAction>>,
    /// Message id to reply to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    /// Create a plain text message
    pub fn new(channel: &str, chat_id: &str, content: &str) -> Self {
        Self {
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            content: content.to_string(),
            actions: Vec::new(),
            reply_to: None,
        }
    }

    /// Add a row of buttons
    pub fn action_row(mut self, row: Vec<MessageAction>) -> Self {
        if !row.is_empty() {
            self.actions.push(row);
        }
        self
    }

    /// Reply to a message; empty ids are ignored
    pub fn reply_to(mut self, message_id: &str) -> Self {
        if !message_id.is_empty() {
            self.reply_to = Some(message_id.to_string());
        }
        self
    }
}

/// File to send to a channel
#[derive(Debug, Clone)]
pub struct OutboundFile {
    pub chat_id: String,
    pub bytes: Vec<u8>,
    pub filename: String,
    pub caption: Option<String>,
}
