//! Text routing for the bot: links, panel buttons and everything else
//!
//! Independent of teloxide; handlers wrap a Telegram chat in a
//! [`ChatOutbound`] and hand the text over.

use crate::bot::orchestrator::{DownloadOrchestrator, DownloadRequest};
use crate::bot::outbound::{ChatOutbound, MessageHandle};
use crate::bot::state::RequestPhase;
use crate::bot::views::{
    BotView, DefaultBotView, BTN_HELP, BTN_NEW_LINK, BTN_NO_WATERMARK, BTN_ORIGINAL,
};
use crate::cache::{CacheEntry, LinkCache};
use crate::resolver::ResolverClient;
use anyhow::Result;
use lazy_regex::regex_is_match;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Downloadable renditions of a resolved video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// `videoUrlHQ`, served without watermark
    NoWatermark,
    /// `url`, the original render
    Original,
}

impl Variant {
    /// Name shown in status texts
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoWatermark => "No watermark",
            Self::Original => "Original",
        }
    }

    /// Name of the uploaded file
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::NoWatermark => "sora_no_watermark.mp4",
            Self::Original => "sora_original.mp4",
        }
    }

    /// Picks this variant's URL from a cached entry
    #[must_use]
    pub fn url_from(self, entry: &CacheEntry) -> Option<&str> {
        match self {
            Self::NoWatermark => entry.high_quality_url.as_deref(),
            Self::Original => entry.alternate_url.as_deref(),
        }
    }
}

/// Meaning of an incoming text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Help button
    Help,
    /// "New link" button
    NewLink,
    /// One of the download buttons
    Download(Variant),
    /// A share page link
    Link(String),
    /// Anything else
    Other,
}

impl Inbound {
    /// Classifies raw message text; surrounding whitespace is ignored
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let text = text.trim();
        match text {
            BTN_HELP => Self::Help,
            BTN_NEW_LINK => Self::NewLink,
            BTN_NO_WATERMARK => Self::Download(Variant::NoWatermark),
            BTN_ORIGINAL => Self::Download(Variant::Original),
            _ if is_sora_link(text) => Self::Link(text.to_string()),
            _ => Self::Other,
        }
    }
}

/// True for `https://sora.chatgpt.com/p/s_<id>` share links, case-insensitive
#[must_use]
pub fn is_sora_link(text: &str) -> bool {
    regex_is_match!(r"^https://sora\.chatgpt\.com/p/s_[\w-]+"i, text)
}

/// Per-message router shared by all chats
pub struct LinkFlow {
    cache: LinkCache,
    resolver: ResolverClient,
    orchestrator: Arc<DownloadOrchestrator>,
}

impl LinkFlow {
    /// Create a flow over the given components
    #[must_use]
    pub const fn new(
        cache: LinkCache,
        resolver: ResolverClient,
        orchestrator: Arc<DownloadOrchestrator>,
    ) -> Self {
        Self {
            cache,
            resolver,
            orchestrator,
        }
    }

    /// Handles one text message from `sender`.
    ///
    /// Messages without a sender (channel posts) are ignored, since links are
    /// cached per user. `inbound` is the user's own message; it is deleted
    /// after a link has been resolved. Returns the phase the request ended in.
    ///
    /// # Errors
    ///
    /// Returns an error only when a plain reply could not be sent.
    pub async fn handle_text(
        &self,
        sender: Option<i64>,
        text: &str,
        inbound: Option<MessageHandle>,
        outbound: Arc<dyn ChatOutbound>,
    ) -> Result<RequestPhase> {
        let Some(user_id) = sender else {
            debug!("Message without a sender ignored");
            return Ok(RequestPhase::Idle);
        };

        match Inbound::classify(text) {
            Inbound::Help => {
                outbound.send_menu(DefaultBotView::help()).await?;
                Ok(RequestPhase::Idle)
            }
            Inbound::NewLink => {
                self.cache.delete(user_id).await;
                outbound.send_menu(DefaultBotView::new_link_prompt()).await?;
                Ok(RequestPhase::Idle)
            }
            Inbound::Download(variant) => self.handle_download(user_id, variant, outbound).await,
            Inbound::Link(link) => self.handle_link(user_id, link, inbound, &*outbound).await,
            Inbound::Other => {
                outbound.send_menu(DefaultBotView::usage_hint()).await?;
                Ok(RequestPhase::Idle)
            }
        }
    }

    async fn handle_link(
        &self,
        user_id: i64,
        link: String,
        inbound: Option<MessageHandle>,
        outbound: &dyn ChatOutbound,
    ) -> Result<RequestPhase> {
        outbound.send_menu(DefaultBotView::link_accepted()).await?;
        debug!(user_id, phase = %RequestPhase::Resolving);

        let resolved = match self.resolver.resolve(&link).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(user_id, error = %e, "Link resolution failed");
                outbound.send_text(DefaultBotView::resolution_failed()).await?;
                return Ok(RequestPhase::Failed);
            }
        };

        let empty = resolved.is_empty();
        self.cache
            .put(
                user_id,
                Some(link),
                resolved.high_quality_url,
                resolved.alternate_url,
            )
            .await;

        if empty {
            info!(user_id, "Resolver returned no links");
            outbound.send_text(DefaultBotView::no_links_found()).await?;
            return Ok(RequestPhase::Failed);
        }

        outbound.send_menu(DefaultBotView::links_ready()).await?;

        if let Some(handle) = inbound {
            if let Err(e) = outbound.delete_message(handle).await {
                debug!(error = %e, "Link message not deleted");
            }
        }

        info!(user_id, "Links cached");
        Ok(RequestPhase::AwaitingAction)
    }

    async fn handle_download(
        &self,
        user_id: i64,
        variant: Variant,
        outbound: Arc<dyn ChatOutbound>,
    ) -> Result<RequestPhase> {
        let Some(entry) = self.cache.get(user_id).await else {
            outbound.send_menu(DefaultBotView::send_link_first()).await?;
            return Ok(RequestPhase::Idle);
        };

        let Some(url) = variant.url_from(&entry) else {
            outbound.send_text(DefaultBotView::variant_missing()).await?;
            return Ok(RequestPhase::Failed);
        };

        info!(user_id, variant = variant.label(), "Download requested");
        let request = DownloadRequest {
            url: url.to_string(),
            label: variant.label().to_string(),
            file_name: variant.file_name().to_string(),
        };
        Ok(self.orchestrator.run(outbound, &request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn classifies_buttons_and_links() {
        assert_eq!(Inbound::classify(BTN_HELP), Inbound::Help);
        assert_eq!(Inbound::classify(" 🔁 New link "), Inbound::NewLink);
        assert_eq!(
            Inbound::classify(BTN_ORIGINAL),
            Inbound::Download(Variant::Original)
        );
        assert_eq!(
            Inbound::classify("  https://sora.chatgpt.com/p/s_abc-123_X\n"),
            Inbound::Link("https://sora.chatgpt.com/p/s_abc-123_X".to_string())
        );
        assert_eq!(Inbound::classify("hello"), Inbound::Other);
    }

    #[test]
    fn link_pattern_is_anchored_and_case_insensitive() {
        assert!(is_sora_link("HTTPS://SORA.CHATGPT.COM/p/S_abc"));
        assert!(is_sora_link("https://sora.chatgpt.com/p/s_abc?utm=1"));
        assert!(!is_sora_link("see https://sora.chatgpt.com/p/s_abc"));
        assert!(!is_sora_link("http://sora.chatgpt.com/p/s_abc"));
        assert!(!is_sora_link("https://sora.chatgpt.com/p/s_"));
        assert!(!is_sora_link("https://sora.chatgpt.com/g/gen_abc"));
    }

    #[test]
    fn variants_pick_their_urls() {
        let entry = CacheEntry {
            user_id: 1,
            source_link: None,
            high_quality_url: Some("https://cdn/x.mp4".to_string()),
            alternate_url: None,
            created_at: Instant::now(),
        };
        assert_eq!(Variant::NoWatermark.url_from(&entry), Some("https://cdn/x.mp4"));
        assert_eq!(Variant::Original.url_from(&entry), None);
        assert_eq!(Variant::Original.file_name(), "sora_original.mp4");
    }
}
