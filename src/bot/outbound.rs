//! Outbound chat interface used by the download flow
//!
//! The flow only talks to a [`ChatOutbound`], so it runs unchanged against
//! Telegram and against a recording fake in tests.

use crate::bot::resilient::{delete_message_safe, edit_message_safe, send_message_resilient};
use crate::bot::views::panel_keyboard;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, MessageId};
use tracing::warn;

/// Opaque reference to a sent (or received) message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(pub i32);

impl From<MessageId> for MessageHandle {
    fn from(id: MessageId) -> Self {
        Self(id.0)
    }
}

impl From<MessageHandle> for MessageId {
    fn from(handle: MessageHandle) -> Self {
        Self(handle.0)
    }
}

/// Messages the flow can send to one chat
#[async_trait]
pub trait ChatOutbound: Send + Sync {
    /// Sends plain text
    async fn send_text(&self, text: &str) -> Result<MessageHandle>;

    /// Sends text with the button panel attached
    async fn send_menu(&self, text: &str) -> Result<MessageHandle>;

    /// Replaces a message's text; callers treat failure as non-fatal
    async fn edit_text(&self, handle: MessageHandle, text: &str) -> Result<()>;

    /// Deletes a message; callers treat failure as non-fatal
    async fn delete_message(&self, handle: MessageHandle) -> Result<()>;

    /// Uploads a local video; failure fails the request
    async fn send_video(&self, path: &Path, file_name: &str, caption: &str) -> Result<()>;
}

/// [`ChatOutbound`] bound to one Telegram chat
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramOutbound {
    /// Create an outbound bound to `chat_id`
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ChatOutbound for TelegramOutbound {
    async fn send_text(&self, text: &str) -> Result<MessageHandle> {
        let msg = send_message_resilient(&self.bot, self.chat_id, text, None).await?;
        Ok(msg.id.into())
    }

    async fn send_menu(&self, text: &str) -> Result<MessageHandle> {
        let msg =
            send_message_resilient(&self.bot, self.chat_id, text, Some(panel_keyboard())).await?;
        Ok(msg.id.into())
    }

    async fn edit_text(&self, handle: MessageHandle, text: &str) -> Result<()> {
        edit_message_safe(&self.bot, self.chat_id, handle.into(), text).await
    }

    async fn delete_message(&self, handle: MessageHandle) -> Result<()> {
        delete_message_safe(&self.bot, self.chat_id, handle.into()).await
    }

    async fn send_video(&self, path: &Path, file_name: &str, caption: &str) -> Result<()> {
        let make_file = || InputFile::file(path.to_path_buf()).file_name(file_name.to_string());

        match self
            .bot
            .send_video(self.chat_id, make_file())
            .caption(caption)
            .supports_streaming(true)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(
                    file_name = %file_name,
                    error = %e,
                    "Failed to send video as native media; falling back to document"
                );
                self.bot
                    .send_document(self.chat_id, make_file())
                    .caption(caption)
                    .await?;
                Ok(())
            }
        }
    }
}
