//! User-facing texts and the reply keyboard panel

use teloxide::types::{KeyboardButton, KeyboardMarkup};

// ─────────────────────────────────────────────────────────────────────────────
// Panel buttons
// ─────────────────────────────────────────────────────────────────────────────

/// Download the watermark-free variant
pub const BTN_NO_WATERMARK: &str = "⬇️ No watermark";
/// Download the original variant
pub const BTN_ORIGINAL: &str = "⬇️ Original";
/// Forget the resolved links
pub const BTN_NEW_LINK: &str = "🔁 New link";
/// Show usage
pub const BTN_HELP: &str = "ℹ️ Help";

/// Reply keyboard shown above the input field
#[must_use]
pub fn panel_keyboard() -> KeyboardMarkup {
    let keyboard = vec![
        vec![
            KeyboardButton::new(BTN_NO_WATERMARK),
            KeyboardButton::new(BTN_ORIGINAL),
        ],
        vec![KeyboardButton::new(BTN_NEW_LINK), KeyboardButton::new(BTN_HELP)],
    ];
    KeyboardMarkup::new(keyboard).resize_keyboard()
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait definition
// ─────────────────────────────────────────────────────────────────────────────

/// Texts of every bot reply
pub trait BotView {
    /// Usage instructions
    fn help() -> &'static str;

    /// Link recognized, resolution started
    fn link_accepted() -> &'static str;

    /// Links resolved, waiting for a button press
    fn links_ready() -> &'static str;

    /// Resolution succeeded but returned no URLs
    fn no_links_found() -> &'static str;

    /// Resolution failed
    fn resolution_failed() -> &'static str;

    /// A download button was pressed with nothing resolved
    fn send_link_first() -> &'static str;

    /// The chosen variant has no URL
    fn variant_missing() -> &'static str;

    /// Cached links dropped
    fn new_link_prompt() -> &'static str;

    /// Unrecognized text
    fn usage_hint() -> &'static str;

    /// Initial status message of a download
    fn download_starting(label: &str) -> String;

    /// Status while the orchestrator retries after a timeout
    fn network_slow() -> &'static str;

    /// Status once the file is on disk
    fn uploading() -> &'static str;

    /// Caption of the delivered video
    fn sent_caption(label: &str) -> String;

    /// The only message shown for any download failure
    fn download_failed() -> &'static str;
}

// ─────────────────────────────────────────────────────────────────────────────
// Default implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Default English-language implementation of `BotView`
pub struct DefaultBotView;

impl BotView for DefaultBotView {
    fn help() -> &'static str {
        "How to use:\n\
         1) Send a Sora link like: https://sora.chatgpt.com/p/s_...\n\
         2) Press a button below: «No watermark» or «Original»\n\
         3) I'll download it and send it back as a file\n\n\
         If it takes a while, that's the CDN; sometimes it just needs a moment."
    }

    fn link_accepted() -> &'static str {
        "Got it ✅ Fetching links…"
    }

    fn links_ready() -> &'static str {
        "Done ✅ Now press a button below: «No watermark» or «Original»."
    }

    fn no_links_found() -> &'static str {
        "No links found in the API response. Try another link."
    }

    fn resolution_failed() -> &'static str {
        "Couldn't fetch the video for this link. Try again later."
    }

    fn send_link_first() -> &'static str {
        "Send a Sora link first."
    }

    fn variant_missing() -> &'static str {
        "No link found for this variant. Send the Sora link again."
    }

    fn new_link_prompt() -> &'static str {
        "OK ✅ Send a new Sora link."
    }

    fn usage_hint() -> &'static str {
        "Send a Sora link (https://sora.chatgpt.com/p/s_...) or press a button below."
    }

    fn download_starting(label: &str) -> String {
        format!("⏳ Downloading «{label}»…")
    }

    fn network_slow() -> &'static str {
        "⏳ The network is slow… trying once more."
    }

    fn uploading() -> &'static str {
        "📤 Downloaded. Sending to Telegram…"
    }

    fn sent_caption(label: &str) -> String {
        format!("Done ✅ «{label}» sent.")
    }

    fn download_failed() -> &'static str {
        "Couldn't download the video (the network or server is slow right now).\n\
         Try pressing the button again in 10–20 seconds, or press «🔁 New link»."
    }
}
