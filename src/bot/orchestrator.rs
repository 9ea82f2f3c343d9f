//! Runs one button-press download from status message to delivered video
//!
//! Wires the [`DownloadEngine`] and a [`ProgressReporter`] to a chat, then
//! cleans up the status message and the temporary file no matter how the
//! request ended.

use crate::bot::outbound::{ChatOutbound, MessageHandle};
use crate::bot::state::RequestPhase;
use crate::bot::views::{BotView, DefaultBotView};
use crate::config::progress_poll_interval;
use crate::download::{DownloadEngine, DownloadError, DownloadProgress, ProgressReporter, StatusSink};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What to download and how to present it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Direct media URL
    pub url: String,
    /// Human-readable variant name shown in status texts
    pub label: String,
    /// File name of the uploaded video
    pub file_name: String,
}

/// Reasons a request ends in [`RequestPhase::Failed`]
#[derive(Debug, Error)]
pub enum FlowError {
    /// The status message could not be posted
    #[error("status message failed: {0}")]
    Status(String),
    /// The engine gave up or was cancelled
    #[error(transparent)]
    Download(#[from] DownloadError),
    /// The engine task died
    #[error("download task failed: {0}")]
    Worker(String),
    /// Telegram rejected the upload
    #[error("sending the video failed: {0}")]
    Send(String),
}

/// Publishes reporter output by editing the status message
struct StatusMessage {
    outbound: Arc<dyn ChatOutbound>,
    handle: MessageHandle,
}

#[async_trait]
impl StatusSink for StatusMessage {
    async fn update(&self, text: &str) -> Result<()> {
        self.outbound.edit_text(self.handle, text).await
    }
}

/// Coordinates engine, reporter and chat for a single request
pub struct DownloadOrchestrator {
    engine: Arc<DownloadEngine>,
    poll_interval: Duration,
    timeout_retries: usize,
}

impl DownloadOrchestrator {
    /// Orchestrator with the default poll interval and one retry after a timeout
    #[must_use]
    pub fn new(engine: Arc<DownloadEngine>) -> Self {
        Self {
            engine,
            poll_interval: progress_poll_interval(),
            timeout_retries: 1,
        }
    }

    /// Overrides the progress poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides how many extra engine runs a timeout earns
    #[must_use]
    pub const fn with_timeout_retries(mut self, retries: usize) -> Self {
        self.timeout_retries = retries;
        self
    }

    /// Downloads `request.url` and delivers it to the chat.
    ///
    /// Returns [`RequestPhase::Done`] or [`RequestPhase::Failed`]. The user
    /// only ever sees the generic failure text, never the underlying error.
    pub async fn run(
        &self,
        outbound: Arc<dyn ChatOutbound>,
        request: &DownloadRequest,
    ) -> RequestPhase {
        let status = match outbound
            .send_text(&DefaultBotView::download_starting(&request.label))
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                let err = FlowError::Status(e.to_string());
                error!(error = %err, label = %request.label, "Download not started");
                return RequestPhase::Failed;
            }
        };

        let progress = Arc::new(DownloadProgress::new());
        let cancel = CancellationToken::new();

        let result = self
            .download_and_send(&outbound, status, request, &progress, &cancel)
            .await;

        // Cleanup runs on every path
        cancel.cancel();
        if let Err(e) = outbound.delete_message(status).await {
            debug!(error = %e, "Status message not deleted");
        }
        if let Some(path) = progress.local_path() {
            remove_file_quietly(&path).await;
        }

        match result {
            Ok(()) => {
                info!(label = %request.label, "Video delivered");
                RequestPhase::Done
            }
            Err(e) => {
                error!(error = %e, label = %request.label, "Download request failed");
                if let Err(e) = outbound.send_text(DefaultBotView::download_failed()).await {
                    warn!(error = %e, "Failure notice not delivered");
                }
                RequestPhase::Failed
            }
        }
    }

    async fn download_and_send(
        &self,
        outbound: &Arc<dyn ChatOutbound>,
        status: MessageHandle,
        request: &DownloadRequest,
        progress: &Arc<DownloadProgress>,
        cancel: &CancellationToken,
    ) -> Result<(), FlowError> {
        let mut retries_left = self.timeout_retries;
        let path = loop {
            match self.run_engine(outbound, status, request, progress, cancel).await {
                Err(FlowError::Download(e)) if e.is_timeout() && retries_left > 0 => {
                    retries_left -= 1;
                    warn!(error = %e, "Download timed out, running once more");
                    if let Err(e) = outbound.edit_text(status, DefaultBotView::network_slow()).await {
                        debug!(error = %e, "Status edit skipped");
                    }
                }
                other => break other?,
            }
        };

        debug!(phase = %RequestPhase::Uploading, path = %path.display());
        if let Err(e) = outbound.edit_text(status, DefaultBotView::uploading()).await {
            debug!(error = %e, "Status edit skipped");
        }

        outbound
            .send_video(
                &path,
                &request.file_name,
                &DefaultBotView::sent_caption(&request.label),
            )
            .await
            .map_err(|e| FlowError::Send(e.to_string()))
    }

    /// One engine run with its own reporter; the reporter is stopped and
    /// awaited before this returns.
    async fn run_engine(
        &self,
        outbound: &Arc<dyn ChatOutbound>,
        status: MessageHandle,
        request: &DownloadRequest,
        progress: &Arc<DownloadProgress>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FlowError> {
        debug!(phase = %RequestPhase::Downloading, url = %request.url);

        // A previous run leaves `done` set; the new reporter must not see it
        progress.reset();
        let reporter_stop = cancel.child_token();
        let sink: Arc<dyn StatusSink> = Arc::new(StatusMessage {
            outbound: Arc::clone(outbound),
            handle: status,
        });
        let reporter = tokio::spawn(
            ProgressReporter::new(request.label.clone())
                .with_interval(self.poll_interval)
                .run(Arc::clone(progress), reporter_stop.clone(), sink),
        );

        let joined = self
            .engine
            .spawn(request.url.clone(), Arc::clone(progress), cancel.clone())
            .await;

        reporter_stop.cancel();
        if let Err(e) = reporter.await {
            warn!(error = %e, "Progress reporter task failed");
        }

        match joined {
            Ok(result) => result.map_err(FlowError::from),
            Err(e) => Err(FlowError::Worker(e.to_string())),
        }
    }
}

async fn remove_file_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Temporary file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Temporary file not removed"),
    }
}
