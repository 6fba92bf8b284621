//! Messaging channel adapters
//!
//! The bot and the digest only see the [`ChannelAdapter`] contract. Telegram
//! is the production channel; the recording adapter backs dry runs.

mod adapter;
mod message;
mod recording;
mod telegram;

pub use adapter::{AdapterBase, AdapterStatus, ChannelAdapter, ChannelEvent};
pub use message::{
    ActionTarget, InboundAction, InboundMessage, MessageAction, MessageAttachment, OutboundFile,
    OutboundMessage,
};
pub use recording::{Recorded, RecordingAdapter};
pub use telegram::{TelegramAdapter, TELEGRAM_MAX_MESSAGE_CHARS};
