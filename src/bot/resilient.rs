//! Resilient messaging utilities for Telegram API operations.
//!
//! Sends are retried on transient network failures using exponential backoff
//! with jitter. Edits and deletes are single best-effort calls whose expected
//! failures ("not modified", "not found") are logged quietly.
//!
//! # Usage
//!
//! ```ignore
//! use sora_fetch_bot::bot::resilient::{send_message_resilient, edit_message_safe};
//!
//! let msg = send_message_resilient(&bot, chat_id, "⏳ Downloading…", None).await?;
//! edit_message_safe(&bot, chat_id, msg.id, "⏳ Downloading… 10%").await?;
//! ```

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, KeyboardMarkup, Message, MessageId};
use tracing::debug;

const ERROR_NOT_MODIFIED: &str = "message is not modified";
const ERROR_NOT_FOUND: &str = "message to edit not found";
const ERROR_DELETE_NOT_FOUND: &str = "message to delete not found";

/// Send a message with automatic retry on network failures.
///
/// Uses [`crate::utils::retry_telegram_operation`] with exponential backoff
/// to handle transient network errors.
///
/// # Arguments
///
/// * `bot` - The Telegram bot instance
/// * `chat_id` - Target chat ID
/// * `text` - Message text to send
/// * `keyboard` - Optional reply keyboard to attach
///
/// # Errors
///
/// Returns an error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    keyboard: Option<KeyboardMarkup>,
) -> Result<Message> {
    let text = text.into();
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(ref markup) = keyboard {
            req = req.reply_markup(markup.clone());
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message once, treating "not modified" as success.
///
/// No retry: status edits are frequent and a retried edit only adds to the
/// rate limit pressure. The caller decides whether a failure matters.
///
/// # Errors
///
/// Returns the Telegram error for anything but "message is not modified".
pub async fn edit_message_safe(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
) -> Result<()> {
    match bot.edit_message_text(chat_id, msg_id, text).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains(ERROR_NOT_MODIFIED) {
                debug!("Message update skipped: {err_msg}");
                return Ok(());
            }
            if err_msg.contains(ERROR_NOT_FOUND) {
                debug!("Message to edit is gone: {err_msg}");
            }
            Err(anyhow::anyhow!("Telegram edit error: {e}"))
        }
    }
}

/// Delete a message once, treating "not found" as success.
///
/// # Errors
///
/// Returns the Telegram error otherwise (e.g. missing rights).
pub async fn delete_message_safe(bot: &Bot, chat_id: ChatId, msg_id: MessageId) -> Result<()> {
    match bot.delete_message(chat_id, msg_id).await {
        Ok(_) => Ok(()),
        Err(e) if e.to_string().contains(ERROR_DELETE_NOT_FOUND) => {
            debug!("Message already deleted: {e}");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Telegram delete error: {e}")),
    }
}
