use crate::bot::flow::LinkFlow;
use crate::bot::outbound::{ChatOutbound, TelegramOutbound};
use crate::bot::state::RequestPhase;
use crate::bot::views::{BotView, DefaultBotView};
use anyhow::Result;
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::info;

/// Supported bot commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "show the panel and usage.")]
    Start,
    #[command(description = "how to use the bot.")]
    Help,
}

/// User ID of the message sender, if the message has one
pub fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|u| u.id.0.cast_signed())
}

/// Answers `/start` and `/help` with the usage text and the button panel.
///
/// # Errors
///
/// Returns an error if the reply could not be sent.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    info!(user_id = ?sender_id(&msg), "Panel requested");
    TelegramOutbound::new(bot, msg.chat.id)
        .send_menu(DefaultBotView::help())
        .await?;
    Ok(())
}

/// Routes a text message through the [`LinkFlow`].
///
/// # Errors
///
/// Returns an error if a reply could not be sent.
pub async fn handle_text(bot: Bot, msg: Message, flow: Arc<LinkFlow>) -> Result<RequestPhase> {
    let text = msg.text().unwrap_or_default();
    let outbound: Arc<dyn ChatOutbound> = Arc::new(TelegramOutbound::new(bot, msg.chat.id));

    flow.handle_text(sender_id(&msg), text, Some(msg.id.into()), outbound)
        .await
}
