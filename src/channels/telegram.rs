//! Telegram channel adapter
//!
//! Talks to the Bot API over HTTPS. Updates arrive through long polling
//! (`getUpdates`) or, in webhook mode, through [`TelegramAdapter::process_update`].

use super::adapter::{AdapterBase, AdapterStatus, ChannelAdapter, ChannelEvent};
use super::message::{
    ActionTarget, InboundAction, InboundMessage, MessageAttachment, OutboundFile, OutboundMessage,
};
use crate::config::{resolve_credential, TelegramConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};

/// Longest text Telegram accepts in one message
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram channel adapter
pub struct TelegramAdapter {
    config: TelegramConfig,
    base: AdapterBase,
    client: reqwest::Client,
    token: Arc<RwLock<Option<String>>>,
    event_tx: Arc<RwLock<Option<mpsc::Sender<ChannelEvent>>>>,
    shutdown: watch::Sender<bool>,
}

impl TelegramAdapter {
    /// Create a new Telegram adapter. The token is resolved on start.
    pub fn new(config: TelegramConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            base: AdapterBase::new("telegram"),
            client: reqwest::Client::new(),
            token: Arc::new(RwLock::new(None)),
            event_tx: Arc::new(RwLock::new(None)),
            shutdown,
        }
    }

    /// Use a fixed token instead of resolving `bot_token_ref`
    pub fn with_token(self, token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(Some(token.into()))),
            ..self
        }
    }

    /// Check if a user is allowed
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        is_allowed(&self.config.allowed_users, user_id)
    }

    /// Convert a raw Bot API update into a channel event.
    ///
    /// Returns `None` for update kinds the bot does not handle.
    pub fn parse_update(update: &serde_json::Value) -> Option<ChannelEvent> {
        let update: TelegramUpdate = serde_json::from_value(update.clone()).ok()?;
        event_from_update(update)
    }

    /// Feed one update pushed by a webhook
    pub async fn process_update(&self, update: serde_json::Value) -> Result<()> {
        let Some(event) = Self::parse_update(&update) else {
            tracing::debug!("Ignoring unsupported Telegram update");
            return Ok(());
        };
        if !event_allowed(&self.config.allowed_users, &event) {
            tracing::debug!("Dropping Telegram update from user outside allow-list");
            return Ok(());
        }

        let tx = self.event_tx.read().await.clone();
        match tx {
            Some(tx) => tx
                .send(event)
                .await
                .map_err(|_| Error::Channel("Event receiver dropped".to_string())),
            None => Err(Error::Channel("Telegram adapter not running".to_string())),
        }
    }

    async fn token(&self) -> Result<String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Channel("Telegram bot token not initialized".to_string()))
    }

    async fn method_url(&self, method: &str) -> Result<String> {
        Ok(format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.token().await?,
            method
        ))
    }

    /// Call a Bot API method with a JSON payload
    async fn call<T: DeserializeOwned>(&self, method: &str, payload: serde_json::Value) -> Result<T> {
        if !self.base.is_running() {
            return Err(Error::Channel("Telegram adapter not running".to_string()));
        }

        let url = self.method_url(method).await?;
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram {} failed: {}", method, e)))?;

        unwrap_response(method, response).await
    }
}

#[async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn start(&self, event_tx: mpsc::Sender<ChannelEvent>) -> Result<()> {
        self.base.set_status(AdapterStatus::Starting);

        if self.token.read().await.is_none() {
            let token = resolve_credential(&self.config.bot_token_ref)?;
            *self.token.write().await = Some(token);
        }

        *self.event_tx.write().await = Some(event_tx.clone());
        self.shutdown.send_replace(false);

        if self.config.long_polling {
            let poller = Poller {
                client: self.client.clone(),
                api_base: self.config.api_base.trim_end_matches('/').to_string(),
                token: self.token().await?,
                timeout_secs: self.config.poll_timeout_secs,
                allowed_users: self.config.allowed_users.clone(),
                event_tx: event_tx.clone(),
            };
            tokio::spawn(poller.run(self.shutdown.subscribe()));
        }

        tracing::info!(
            long_polling = self.config.long_polling,
            "Telegram adapter starting"
        );

        let _ = event_tx
            .send(ChannelEvent::Connected {
                channel: "telegram".to_string(),
            })
            .await;

        self.base.set_status(AdapterStatus::Running);

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.base.set_status(AdapterStatus::Stopping);
        self.shutdown.send_replace(true);

        if let Some(tx) = self.event_tx.read().await.as_ref() {
            let _ = tx
                .send(ChannelEvent::Disconnected {
                    channel: "telegram".to_string(),
                    reason: "Adapter stopped".to_string(),
                })
                .await;
        }

        *self.event_tx.write().await = None;
        self.base.set_status(AdapterStatus::Stopped);

        tracing::info!("Telegram adapter stopped");

        Ok(())
    }

    async fn send_message(&self, message: OutboundMessage) -> Result<String> {
        tracing::debug!(
            chat = %message.chat_id,
            chars = message.content.chars().count(),
            "Sending Telegram message"
        );

        let mut payload = serde_json::json!({
            "chat_id": message.chat_id,
            "text": message.content,
        });
        if !message.actions.is_empty() {
            payload["reply_markup"] = serde_json::json!({
                "inline_keyboard": inline_keyboard(&message),
            });
        }
        if let Some(reply_to) = message.reply_to.as_deref().and_then(|id| id.parse::<i64>().ok()) {
            payload["reply_to_message_id"] = reply_to.into();
        }

        let sent: SentMessage = self.call("sendMessage", payload).await?;
        Ok(sent.message_id.to_string())
    }

    async fn send_file(&self, file: OutboundFile) -> Result<String> {
        if !self.base.is_running() {
            return Err(Error::Channel("Telegram adapter not running".to_string()));
        }

        tracing::debug!(
            chat = %file.chat_id,
            filename = %file.filename,
            bytes = file.bytes.len(),
            "Sending Telegram document"
        );

        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str("text/plain; charset=utf-8")
            .map_err(|e| Error::Channel(format!("Invalid document part: {}", e)))?;
        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", file.chat_id)
            .part("document", part);
        if let Some(caption) = file.caption {
            form = form.text("caption", caption);
        }

        let url = self.method_url("sendDocument").await?;
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendDocument failed: {}", e)))?;

        let sent: SentMessage = unwrap_response("sendDocument", response).await?;
        Ok(sent.message_id.to_string())
    }

    async fn edit_message(&self, chat_id: &str, message_id: &str, content: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "message_id": parse_message_id(message_id)?,
            "text": content,
        });
        let _: serde_json::Value = self.call("editMessageText", payload).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "message_id": parse_message_id(message_id)?,
        });
        let _: bool = self.call("deleteMessage", payload).await?;
        Ok(())
    }

    async fn answer_action(&self, callback_id: &str) -> Result<()> {
        let payload = serde_json::json!({ "callback_query_id": callback_id });
        let _: bool = self.call("answerCallbackQuery", payload).await?;
        Ok(())
    }

    async fn download_attachment(&self, attachment: &MessageAttachment) -> Result<Vec<u8>> {
        let file: TelegramFile = self
            .call("getFile", serde_json::json!({ "file_id": attachment.file_id }))
            .await?;
        let file_path = file
            .file_path
            .ok_or_else(|| Error::Channel("Telegram file has no download path".to_string()))?;

        let url = format!(
            "{}/file/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.token().await?,
            file_path
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram file download failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Channel(format!(
                "Telegram file download failed: {}",
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn max_message_chars(&self) -> usize {
        TELEGRAM_MAX_MESSAGE_CHARS
    }

    fn is_connected(&self) -> bool {
        self.base.is_running()
    }
}

/// Long polling loop state
struct Poller {
    client: reqwest::Client,
    api_base: String,
    token: String,
    timeout_secs: u64,
    allowed_users: Vec<i64>,
    event_tx: mpsc::Sender<ChannelEvent>,
}

impl Poller {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut offset: i64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = tokio::select! {
                _ = shutdown.changed() => break,
                result = self.fetch(offset) => result,
            };

            match result {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let Some(event) = event_from_update(update) else {
                            continue;
                        };
                        if !event_allowed(&self.allowed_users, &event) {
                            continue;
                        }
                        if self.event_tx.send(event).await.is_err() {
                            tracing::debug!("Event receiver dropped, stopping Telegram polling");
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Telegram polling failed: {}", e);
                    let _ = self
                        .event_tx
                        .send(ChannelEvent::Error {
                            channel: "telegram".to_string(),
                            error: e.to_string(),
                        })
                        .await;
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::debug!("Telegram polling stopped");
    }

    async fn fetch(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let url = format!("{}/bot{}/getUpdates", self.api_base, self.token);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.timeout_secs.to_string()),
            ])
            .timeout(Duration::from_secs(self.timeout_secs + 10))
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getUpdates failed: {}", e)))?;

        unwrap_response("getUpdates", response).await
    }
}

async fn unwrap_response<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body: TelegramApiResponse<T> = response.json().await.map_err(|e| {
        Error::Channel(format!(
            "Failed to parse Telegram {} response ({}): {}",
            method, status, e
        ))
    })?;

    if !body.ok {
        return Err(Error::Channel(format!(
            "Telegram {} error: {}",
            method,
            body.description.unwrap_or_else(|| status.to_string())
        )));
    }

    body.result
        .ok_or_else(|| Error::Channel(format!("Telegram {} returned no result", method)))
}

fn parse_message_id(message_id: &str) -> Result<i64> {
    message_id
        .parse()
        .map_err(|_| Error::Channel(format!("Invalid Telegram message id: {}", message_id)))
}

fn is_allowed(allowed_users: &[i64], user_id: i64) -> bool {
    allowed_users.is_empty() || allowed_users.contains(&user_id)
}

fn event_allowed(allowed_users: &[i64], event: &ChannelEvent) -> bool {
    let sender = match event {
        ChannelEvent::Message(msg) => &msg.sender_id,
        ChannelEvent::Action(action) => &action.sender_id,
        _ => return true,
    };
    sender
        .parse::<i64>()
        .map(|id| is_allowed(allowed_users, id))
        .unwrap_or(false)
}

fn inline_keyboard(message: &OutboundMessage) -> Vec<Vec<InlineButton>> {
    message
        .actions
        .iter()
        .map(|row| {
            row.iter()
                .map(|action| match &action.target {
                    ActionTarget::Callback(data) => InlineButton {
                        text: action.label.clone(),
                        callback_data: Some(data.clone()),
                        url: None,
                    },
                    ActionTarget::Url(url) => InlineButton {
                        text: action.label.clone(),
                        callback_data: None,
                        url: Some(url.clone()),
                    },
                })
                .collect()
        })
        .collect()
}

fn event_from_update(update: TelegramUpdate) -> Option<ChannelEvent> {
    if let Some(message) = update.message {
        let from = message.from?;
        let content = message.text.or(message.caption).unwrap_or_default();
        let attachment = message.document.map(|doc| MessageAttachment {
            file_id: doc.file_id,
            file_name: doc.file_name,
            mime_type: doc.mime_type,
            size: doc.file_size,
        });
        if content.is_empty() && attachment.is_none() {
            return None;
        }

        let mut inbound = InboundMessage::new(
            "telegram",
            &from.id.to_string(),
            &message.chat.id.to_string(),
            &content,
        );
        inbound.channel_message_id = message.message_id.to_string();
        inbound.timestamp = message.date * 1000;
        inbound.attachment = attachment;
        return Some(ChannelEvent::Message(inbound));
    }

    if let Some(query) = update.callback_query {
        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);
        return Some(ChannelEvent::Action(InboundAction {
            channel: "telegram".to_string(),
            sender_id: query.from.id.to_string(),
            chat_id: chat_id.to_string(),
            data: query.data.unwrap_or_default(),
            callback_id: query.id,
            message_id: query.message.map(|m| m.message_id.to_string()),
        }));
    }

    None
}

// Bot API wire types

#[derive(Debug, Deserialize)]
struct TelegramApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
    callback_query: Option<TelegramCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    from: Option<TelegramUser>,
    chat: TelegramChat,
    #[serde(default)]
    date: i64,
    text: Option<String>,
    caption: Option<String>,
    document: Option<TelegramDocument>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramDocument {
    file_id: String,
    file_name: Option<String>,
    mime_type: Option<String>,
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TelegramCallbackQuery {
    id: String,
    from: TelegramUser,
    message: Option<TelegramCallbackMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramCallbackMessage {
    message_id: i64,
    chat: TelegramChat,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Serialize)]
struct InlineButton {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}
