//! Periodic status-message updater for a running download
//!
//! Polls [`DownloadProgress`] on a fixed interval and pushes the rendered
//! text to a [`StatusSink`] only when it changed. Sink failures are logged
//! and ignored.

use super::progress::{DownloadProgress, ProgressSnapshot};
use crate::config::progress_poll_interval;
use crate::utils::format_megabytes;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Destination of rendered status lines, typically an editable chat message
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Replaces the visible status text
    async fn update(&self, text: &str) -> Result<()>;
}

/// Renders and publishes download progress
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    label: String,
    interval: Duration,
}

impl ProgressReporter {
    /// Reporter for a download shown to the user as `label`
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            interval: progress_poll_interval(),
        }
    }

    /// Overrides the poll interval
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Formats a snapshot for display.
    ///
    /// The percentage never reaches 100 before the download is done.
    #[must_use]
    pub fn render(&self, snapshot: &ProgressSnapshot) -> String {
        let downloaded = format_megabytes(snapshot.bytes_downloaded);

        let mut text = match snapshot.total_bytes {
            Some(total) if total > 0 => {
                let pct = if snapshot.is_done {
                    100
                } else {
                    (snapshot.bytes_downloaded.saturating_mul(100) / total).min(99)
                };
                format!(
                    "⏳ Downloading «{}»… {pct}%  ({downloaded} / {})",
                    self.label,
                    format_megabytes(total)
                )
            }
            _ => format!("⏳ Downloading «{}»… ({downloaded})", self.label),
        };

        if let Some(status) = snapshot.http_status {
            text.push_str(&format!(" · HTTP {status}"));
        }
        text
    }

    /// Polls until the download is done or `cancel` fires.
    ///
    /// Returns the number of successful status updates.
    pub async fn run(
        self,
        progress: Arc<DownloadProgress>,
        cancel: CancellationToken,
        sink: Arc<dyn StatusSink>,
    ) -> usize {
        let mut last_text = String::new();
        let mut updates = 0;

        loop {
            if progress.is_done() || cancel.is_cancelled() {
                break;
            }

            let text = self.render(&progress.snapshot());
            if text != last_text {
                match sink.update(&text).await {
                    Ok(()) => {
                        last_text = text;
                        updates += 1;
                    }
                    Err(e) => debug!(error = %e, "Progress update skipped"),
                }
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        debug!(updates, label = %self.label, "Progress reporter stopped");
        updates
    }
}
