//! Configuration and settings management
//!
//! Loads settings from environment variables and defines pipeline constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default endpoint of the video resolution service
pub const DEFAULT_RESOLVER_API_URL: &str = "https://sorasave.questloops.com/api/video-info";

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Endpoint that turns a share link into direct media URLs
    #[serde(default = "default_resolver_api_url")]
    pub resolver_api_url: String,

    /// Directory for temporary downloads (system temp dir when unset)
    pub download_dir: Option<PathBuf>,

    /// Port for the liveness endpoint; disabled when unset
    pub health_port: Option<u16>,
}

fn default_resolver_api_url() -> String {
    DEFAULT_RESOLVER_API_URL.to_string()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sora_fetch_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or no bot token is configured.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() maps UPPER_SNAKE_CASE to snake_case,
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true));

        // Older deployments export BOT_TOKEN instead of TELEGRAM_TOKEN
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            if !token.is_empty() {
                builder = builder.set_default("telegram_token", token)?;
            }
        }

        let settings: Self = builder.build()?.try_deserialize()?;

        if settings.telegram_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "telegram_token is empty (set TELEGRAM_TOKEN or BOT_TOKEN)".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Directory used for in-flight downloads
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

// Link cache
/// Lifetime of resolved links for a user
pub const LINK_CACHE_TTL_SECS: u64 = 10 * 60;
/// Maximum number of users kept in the link cache
pub const LINK_CACHE_MAX_SIZE: u64 = 10_000;

// Resolver
/// Whole-request timeout for the resolution call
pub const RESOLVE_TIMEOUT_SECS: u64 = 40;

// Download engine
/// Connect budget for one download attempt
pub const DOWNLOAD_CONNECT_TIMEOUT_SECS: u64 = 20;
/// Read budget (between body reads) for one download attempt
pub const DOWNLOAD_READ_TIMEOUT_SECS: u64 = 300;
/// Size of the slices the body is written and accounted in
pub const DOWNLOAD_CHUNK_SIZE: usize = 512 * 1024;
/// Delay before each attempt; its length is the attempt budget
pub const DOWNLOAD_RETRY_DELAYS_SECS: &[u64] = &[0, 2, 5, 10];

// Progress reporter
/// Poll interval of the status message updater
pub const PROGRESS_POLL_INTERVAL_MS: u64 = 1200;

// Telegram API retries
/// Maximum retries for Telegram API calls
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Cap for Telegram API retry backoff
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Pause before polling again when another instance holds `getUpdates`
pub const POLLING_CONFLICT_BACKOFF_SECS: u64 = 5;

/// Poll interval as a `Duration`
#[must_use]
pub const fn progress_poll_interval() -> Duration {
    Duration::from_millis(PROGRESS_POLL_INTERVAL_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Single test to avoid environment variable races between test threads
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::remove_var("BOT_TOKEN");
        env::set_var("TELEGRAM_TOKEN", "dummy_token");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.resolver_api_url, DEFAULT_RESOLVER_API_URL);
        assert_eq!(settings.health_port, None);
        assert_eq!(settings.download_dir(), env::temp_dir());

        env::remove_var("TELEGRAM_TOKEN");

        // Legacy variable name
        env::set_var("BOT_TOKEN", "legacy_token");
        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "legacy_token");
        env::remove_var("BOT_TOKEN");

        // Missing token is fatal
        assert!(Settings::new().is_err());
        Ok(())
    }

    #[test]
    fn retry_schedule_has_four_attempts() {
        assert_eq!(DOWNLOAD_RETRY_DELAYS_SECS.len(), 4);
        assert_eq!(DOWNLOAD_RETRY_DELAYS_SECS[0], 0);
    }
}
