//! Telegram bot that turns Sora share links into downloadable videos.

/// Telegram surface: routing, orchestration and outbound messaging
pub mod bot;
/// Per-user cache of resolved links
pub mod cache;
/// Settings and tuning constants
pub mod config;
/// Resilient download pipeline
pub mod download;
/// Liveness HTTP endpoint
pub mod health;
/// Client for the link resolution API
pub mod resolver;
/// Shared helpers
pub mod utils;
