//! In-process adapter that records outbound traffic
//!
//! Used by `jobpilot digest --dry-run` to print what would be sent, and by
//! tests to observe what the bot and the digest deliver.

use super::adapter::{AdapterBase, AdapterStatus, ChannelAdapter, ChannelEvent};
use super::message::{MessageAttachment, OutboundFile, OutboundMessage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// One recorded outbound operation
#[derive(Debug, Clone)]
pub enum Recorded {
    Message { id: String, message: OutboundMessage },
    File { id: String, chat_id: String, filename: String, caption: Option<String>, bytes: Vec<u8> },
    Edit { chat_id: String, message_id: String, content: String },
    Delete { chat_id: String, message_id: String },
    Answer { callback_id: String },
}

#[derive(Default)]
struct State {
    log: Vec<Recorded>,
    next_id: u64,
    failing_chats: HashSet<String>,
    attachments: HashMap<String, Vec<u8>>,
}

/// Adapter that records instead of delivering
pub struct RecordingAdapter {
    base: AdapterBase,
    max_chars: usize,
    echo: bool,
    state: Mutex<State>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self {
            base: AdapterBase::new("recording"),
            max_chars: super::telegram::TELEGRAM_MAX_MESSAGE_CHARS,
            echo: false,
            state: Mutex::new(State::default()),
        }
    }

    /// Override the inline message limit
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Print every outbound message to stdout
    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Make every send to `chat_id` fail
    pub fn fail_chat(&self, chat_id: &str) {
        self.lock().failing_chats.insert(chat_id.to_string());
    }

    /// Serve `bytes` for downloads of `file_id`
    pub fn put_attachment(&self, file_id: &str, bytes: impl Into<Vec<u8>>) {
        self.lock().attachments.insert(file_id.to_string(), bytes.into());
    }

    /// Everything recorded so far
    pub fn recorded(&self) -> Vec<Recorded> {
        self.lock().log.clone()
    }

    /// Messages sent to one chat, in order
    pub fn messages_to(&self, chat_id: &str) -> Vec<OutboundMessage> {
        self.lock()
            .log
            .iter()
            .filter_map(|r| match r {
                Recorded::Message { message, .. } if message.chat_id == chat_id => {
                    Some(message.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Texts sent to one chat, in order
    pub fn texts_to(&self, chat_id: &str) -> Vec<String> {
        self.messages_to(chat_id)
            .into_iter()
            .map(|m| m.content)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_chat(&self, state: &State, chat_id: &str) -> Result<()> {
        if state.failing_chats.contains(chat_id) {
            return Err(Error::Channel(format!("delivery to chat {} failed", chat_id)));
        }
        Ok(())
    }
}

impl Default for RecordingAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelAdapter for RecordingAdapter {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, event_tx: mpsc::Sender<ChannelEvent>) -> Result<()> {
        self.base.set_status(AdapterStatus::Running);
        let _ = event_tx
            .send(ChannelEvent::Connected {
                channel: self.name().to_string(),
            })
            .await;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.base.set_status(AdapterStatus::Stopped);
        Ok(())
    }

    async fn send_message(&self, message: OutboundMessage) -> Result<String> {
        let mut state = self.lock();
        self.check_chat(&state, &message.chat_id)?;
        state.next_id += 1;
        let id = state.next_id.to_string();

        if self.echo {
            println!("[{}] {}", message.chat_id, message.content);
            for row in &message.actions {
                let labels: Vec<&str> = row.iter().map(|a| a.label.as_str()).collect();
                println!("[{}]   buttons: {}", message.chat_id, labels.join(" | "));
            }
        }

        state.log.push(Recorded::Message {
            id: id.clone(),
            message,
        });
        Ok(id)
    }

    async fn send_file(&self, file: OutboundFile) -> Result<String> {
        let mut state = self.lock();
        self.check_chat(&state, &file.chat_id)?;
        state.next_id += 1;
        let id = state.next_id.to_string();

        if self.echo {
            println!("[{}] <file {} ({} bytes)>", file.chat_id, file.filename, file.bytes.len());
        }

        state.log.push(Recorded::File {
            id: id.clone(),
            chat_id: file.chat_id,
            filename: file.filename,
            caption: file.caption,
            bytes: file.bytes,
        });
        Ok(id)
    }

    async fn edit_message(&self, chat_id: &str, message_id: &str, content: &str) -> Result<()> {
        let mut state = self.lock();
        self.check_chat(&state, chat_id)?;
        state.log.push(Recorded::Edit {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()> {
        let mut state = self.lock();
        self.check_chat(&state, chat_id)?;
        state.log.push(Recorded::Delete {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn answer_action(&self, callback_id: &str) -> Result<()> {
        self.lock().log.push(Recorded::Answer {
            callback_id: callback_id.to_string(),
        });
        Ok(())
    }

    async fn download_attachment(&self, attachment: &MessageAttachment) -> Result<Vec<u8>> {
        self.lock()
            .attachments
            .get(&attachment.file_id)
            .cloned()
            .ok_or_else(|| Error::Channel(format!("unknown file {}", attachment.file_id)))
    }

    fn max_message_chars(&self) -> usize {
        self.max_chars
    }

    fn is_connected(&self) -> bool {
        self.base.is_running()
    }
}
