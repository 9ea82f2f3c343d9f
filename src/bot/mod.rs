/// Text routing for links and panel buttons
pub mod flow;
/// Command and message handlers
pub mod handlers;
/// Per-request download coordination
pub mod orchestrator;
/// Outbound chat interface
pub mod outbound;
/// Update listener error handling
pub mod polling;
/// Resilient messaging utilities for Telegram API operations
pub mod resilient;
/// Request phases
pub mod state;
/// User-facing texts and keyboard
pub mod views;

pub use flow::LinkFlow;
pub use orchestrator::DownloadOrchestrator;
pub use outbound::{ChatOutbound, MessageHandle, TelegramOutbound};
