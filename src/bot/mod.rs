//! Inbound event handling
//!
//! Routes one user's messages and button presses: commands first, then the
//! active conversation, then pasted links, then a hint. Events of one user
//! are handled strictly in order by [`UserLanes`].

mod commands;
mod lanes;
mod replies;

pub use commands::Command;
pub use lanes::{lane_key, UserLanes};

use crate::actions::{ActionResolver, Delivery, PendingLetter};
use crate::channels::{
    ChannelAdapter, ChannelEvent, InboundAction, InboundMessage, MessageAttachment, OutboundFile,
    OutboundMessage,
};
use crate::conversation::{
    ConversationEngine, ConversationInput, FlowDefaults, FlowKind, SessionStore, Step,
};
use crate::digest::DigestScheduler;
use crate::documents::DocumentExtractor;
use crate::error::{Error, Result};
use crate::profile::{toggle_alert, AlertToggle, ProfileStore};
use crate::workers::WorkerPool;
use std::sync::Arc;

/// The conversational front end
pub struct Bot {
    channel: Arc<dyn ChannelAdapter>,
    profiles: Arc<dyn ProfileStore>,
    sessions: Arc<SessionStore>,
    engine: ConversationEngine,
    digest: Arc<DigestScheduler>,
    resolver: ActionResolver,
    extractor: Arc<dyn DocumentExtractor>,
    workers: WorkerPool,
}

impl Bot {
    /// Flow defaults follow the configured digest time
    pub fn new(
        channel: Arc<dyn ChannelAdapter>,
        profiles: Arc<dyn ProfileStore>,
        sessions: Arc<SessionStore>,
        digest: Arc<DigestScheduler>,
        resolver: ActionResolver,
        extractor: Arc<dyn DocumentExtractor>,
        workers: WorkerPool,
    ) -> Self {
        let defaults = FlowDefaults {
            alert_hour: digest.config().hour,
            alert_minute: digest.config().minute,
        };
        Self {
            engine: ConversationEngine::new(profiles.clone(), defaults),
            channel,
            profiles,
            sessions,
            digest,
            resolver,
            extractor,
            workers,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one event. On failure the user gets a short notice and the
    /// error is returned for logging.
    pub async fn handle_event(&self, event: ChannelEvent) -> Result<()> {
        let (chat_id, result) = match event {
            ChannelEvent::Message(message) => {
                let chat_id = message.chat_id.clone();
                (chat_id, self.handle_message(message).await)
            }
            ChannelEvent::Action(action) => {
                let chat_id = action.chat_id.clone();
                (chat_id, self.handle_action(action).await)
            }
            other => {
                tracing::debug!("Bot ignores event: {:?}", other);
                return Ok(());
            }
        };

        if result.is_err() {
            if let Err(e) = self.reply(&chat_id, replies::FAILURE).await {
                tracing::warn!(chat = %chat_id, "Failure notice not sent: {}", e);
            }
        }
        result
    }

    async fn reply(&self, chat_id: &str, text: &str) -> Result<String> {
        self.channel
            .send_message(OutboundMessage::new(self.channel.name(), chat_id, text))
            .await
    }

    async fn handle_message(&self, message: InboundMessage) -> Result<()> {
        tracing::debug!(
            user = %message.sender_id,
            has_attachment = message.attachment.is_some(),
            "Received message"
        );

        if let Some(command) = Command::parse(&message.content) {
            return self.handle_command(command, &message).await;
        }

        if self.sessions.checkout(&message.sender_id).await?.is_some() {
            return self.continue_session(&message).await;
        }

        if let Some(url) = self.resolver.extract_url(&message.content) {
            return self.handle_link(&message, &url).await;
        }

        self.reply(&message.chat_id, replies::HINT).await?;
        Ok(())
    }

    async fn handle_command(&self, command: Command, message: &InboundMessage) -> Result<()> {
        let user_id = message.sender_id.as_str();
        let chat_id = message.chat_id.as_str();
        let config = self.digest.config();

        tracing::debug!(user = %user_id, command = ?command, "Command");

        match command {
            Command::Start => {
                self.reply(chat_id, replies::WELCOME).await?;
            }
            Command::Help => {
                self.reply(chat_id, replies::HELP).await?;
            }
            Command::Status => {
                let profile = self.profiles.get_or_default(user_id).await?;
                self.reply(chat_id, &replies::status(&profile, config.hour, config.minute))
                    .await?;
            }
            Command::Alert => {
                let text = match toggle_alert(self.profiles.as_ref(), user_id).await? {
                    AlertToggle::Enabled => replies::alert_enabled(config.hour, config.minute),
                    AlertToggle::Disabled => replies::ALERT_DISABLED.to_string(),
                    AlertToggle::MissingPreference => replies::NEED_PREFERENCES.to_string(),
                };
                self.reply(chat_id, &text).await?;
            }
            Command::SearchNow => self.search_now(user_id, chat_id).await?,
            Command::Setup => self.start_flow(FlowKind::Documents, user_id, chat_id).await?,
            Command::JobSetup => {
                self.start_flow(FlowKind::Preferences, user_id, chat_id)
                    .await?
            }
            Command::Cancel => {
                if self.sessions.checkout(user_id).await?.is_some() {
                    self.continue_session(message).await?;
                } else {
                    self.reply(chat_id, replies::NOTHING_TO_CANCEL).await?;
                }
            }
            Command::Unknown(name) => {
                tracing::debug!(user = %user_id, command = %name, "Unknown command");
                self.reply(chat_id, replies::UNKNOWN_COMMAND).await?;
            }
        }
        Ok(())
    }

    async fn start_flow(&self, kind: FlowKind, user_id: &str, chat_id: &str) -> Result<()> {
        let (session, prompt) = self.engine.start(kind, user_id)?;
        self.sessions.checkin(session).await?;
        self.reply(chat_id, &prompt).await?;
        Ok(())
    }

    async fn continue_session(&self, message: &InboundMessage) -> Result<()> {
        let user_id = message.sender_id.as_str();
        let chat_id = message.chat_id.as_str();
        let Some(mut session) = self.sessions.checkout(user_id).await? else {
            return Ok(());
        };

        let input = match &message.attachment {
            Some(attachment) => {
                self.reply(chat_id, replies::PROCESSING).await?;
                match self.read_document(attachment).await {
                    Ok(text) => ConversationInput::Document {
                        file_name: attachment.file_name.clone(),
                        text,
                    },
                    Err(Error::Document(reason)) => {
                        self.reply(chat_id, &format!("❌ {}", reason)).await?;
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
            None => ConversationInput::from_text(&message.content),
        };

        let step = self.engine.advance(&mut session, input).await?;
        match &step {
            Step::Completed(_) | Step::Cancelled(_) => self.sessions.discard(user_id).await?,
            Step::Prompt(_) => self.sessions.checkin(session).await?,
            Step::Reprompt { .. } => {}
        }

        self.reply(chat_id, &step.reply()).await?;
        Ok(())
    }

    async fn read_document(&self, attachment: &MessageAttachment) -> Result<String> {
        let bytes = self
            .channel
            .download_attachment(attachment)
            .await
            .map_err(|e| {
                tracing::warn!(file = %attachment.file_id, "Download failed: {}", e);
                Error::Document("Die Datei konnte nicht geladen werden.".to_string())
            })?;
        let extractor = self.extractor.clone();
        self.workers
            .run("extract_text", move || extractor.extract_text(&bytes))
            .await
            .and_then(|text| text)
    }

    async fn search_now(&self, user_id: &str, chat_id: &str) -> Result<()> {
        let profile = self.profiles.get_or_default(user_id).await?;
        let Some(preference) = profile.search_preference else {
            self.reply(chat_id, replies::NEED_PREFERENCES).await?;
            return Ok(());
        };

        let progress = self.reply(chat_id, replies::SEARCHING_NOW).await?;
        let postings = self.digest.search(&preference).await;
        if let Err(e) = self.channel.delete_message(chat_id, &progress).await {
            tracing::debug!(chat = %chat_id, "Progress notice not deleted: {}", e);
        }

        self.digest.deliver_postings(user_id, postings).await?;
        Ok(())
    }

    async fn handle_action(&self, action: InboundAction) -> Result<()> {
        if let Err(e) = self.channel.answer_action(&action.callback_id).await {
            tracing::debug!("Action not acknowledged: {}", e);
        }

        let pending = match self
            .resolver
            .prepare_cached(&action.sender_id, &action.data)
            .await?
        {
            Ok(pending) => pending,
            Err(rejection) => {
                self.reply(&action.chat_id, &rejection.to_string()).await?;
                return Ok(());
            }
        };

        let notice = match &pending.posting {
            Some(p) => replies::writing_for(&p.title, &p.company),
            None => replies::GENERATING.to_string(),
        };
        let notice_id = self.reply(&action.chat_id, &notice).await?;
        self.finish_letter(&action.chat_id, &notice_id, pending).await
    }

    async fn handle_link(&self, message: &InboundMessage, url: &str) -> Result<()> {
        let chat_id = message.chat_id.as_str();
        let documents = match self.resolver.documents(&message.sender_id).await? {
            Ok(documents) => documents,
            Err(rejection) => {
                self.reply(chat_id, &rejection.to_string()).await?;
                return Ok(());
            }
        };

        let notice_id = self.reply(chat_id, replies::LOADING_LISTING).await?;
        let pending = match self.resolver.prepare_link(documents, url).await {
            Ok(pending) => pending,
            Err(rejection) => {
                self.channel
                    .edit_message(chat_id, &notice_id, &rejection.to_string())
                    .await?;
                return Ok(());
            }
        };

        self.channel
            .edit_message(chat_id, &notice_id, replies::GENERATING)
            .await?;
        self.finish_letter(chat_id, &notice_id, pending).await
    }

    /// Generate, then replace the progress notice with the letter
    async fn finish_letter(
        &self,
        chat_id: &str,
        notice_id: &str,
        pending: PendingLetter,
    ) -> Result<()> {
        let delivery = match self
            .resolver
            .generate(pending, self.channel.max_message_chars())
            .await
        {
            Ok(delivery) => delivery,
            Err(rejection) => {
                self.channel
                    .edit_message(chat_id, notice_id, &rejection.to_string())
                    .await?;
                return Ok(());
            }
        };

        if let Err(e) = self.channel.delete_message(chat_id, notice_id).await {
            tracing::debug!(chat = %chat_id, "Progress notice not deleted: {}", e);
        }

        match delivery {
            Delivery::Inline(text) => {
                self.reply(chat_id, &text).await?;
            }
            Delivery::Attachment {
                bytes,
                filename,
                caption,
            } => {
                self.channel
                    .send_file(OutboundFile {
                        chat_id: chat_id.to_string(),
                        bytes,
                        filename,
                        caption: Some(caption),
                    })
                    .await?;
            }
        }
        Ok(())
    }
}
