//! Small helpers shared by the bot and the download pipeline.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Formats a byte count as mebibytes with one decimal.
///
/// # Examples
///
/// ```
/// use sora_fetch_bot::utils::format_megabytes;
/// assert_eq!(format_megabytes(1_572_864), "1.5 MB");
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / BYTES_PER_MB)
}

/// Retry a Telegram API operation with exponential backoff.
///
/// Used for outbound calls (send, edit, upload) that may fail on transient
/// network errors. Jitter avoids synchronized retries:
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max retries: 3 (constants in `config.rs`)
///
/// # Errors
///
/// Returns the last error if every attempt fails.
///
/// # Examples
///
/// ```no_run
/// use sora_fetch_bot::utils::retry_telegram_operation;
/// use anyhow::Result;
///
/// async fn ping() -> Result<()> {
///     Ok(())
/// }
///
/// # async fn example() -> Result<()> {
/// retry_telegram_operation(|| async { ping().await }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} retries: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}
