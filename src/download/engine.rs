//! Download engine: fetch a URL into a temporary file
//!
//! Every attempt restarts from byte 0 into a fresh file. Classified HTTP
//! failures, timeouts and I/O errors consume an attempt; cancellation never
//! does and is always terminal.

use super::backoff::BackoffPolicy;
use super::error::{AttemptError, DownloadError};
use super::progress::DownloadProgress;
use super::transport::{ByteStream, DownloadTransport, ReqwestTransport};
use crate::config::DOWNLOAD_CHUNK_SIZE;
use bytes::BytesMut;
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why an attempt stopped early
enum Abort {
    Cancelled,
    Failed(AttemptError),
}

impl From<AttemptError> for Abort {
    fn from(e: AttemptError) -> Self {
        Self::Failed(e)
    }
}

impl From<std::io::Error> for Abort {
    fn from(e: std::io::Error) -> Self {
        Self::Failed(AttemptError::Io(e))
    }
}

/// Retrying, cancellable file fetcher
pub struct DownloadEngine {
    transport: Arc<dyn DownloadTransport>,
    backoff: BackoffPolicy,
    chunk_size: usize,
    download_dir: PathBuf,
}

impl DownloadEngine {
    /// Engine over reqwest with the default schedule and chunk size
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()), download_dir)
    }

    /// Engine over a custom transport
    #[must_use]
    pub fn with_transport(
        transport: Arc<dyn DownloadTransport>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            backoff: BackoffPolicy::default(),
            chunk_size: DOWNLOAD_CHUNK_SIZE,
            download_dir: download_dir.into(),
        }
    }

    /// Replaces the retry schedule
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the write/accounting chunk size
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Runs [`Self::download`] on its own task so the caller stays responsive
    pub fn spawn(
        self: &Arc<Self>,
        url: String,
        progress: Arc<DownloadProgress>,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<PathBuf, DownloadError>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.download(&url, &progress, &cancel).await })
    }

    /// Downloads `url` into a new file in the download directory.
    ///
    /// `progress` is reset on entry and marked done on every exit.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::Cancelled` if `cancel` fires, or
    /// `DownloadError::Exhausted` with the last attempt's error once the
    /// retry budget is spent.
    pub async fn download(
        &self,
        url: &str,
        progress: &DownloadProgress,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        progress.reset();

        let result = self.run_attempts(url, progress, cancel).await;
        match &result {
            Ok(path) => {
                info!(path = %path.display(), bytes = progress.bytes_downloaded(), "Download finished");
                progress.set_local_path(path);
            }
            Err(DownloadError::Cancelled) => {
                progress.set_last_error(DownloadError::Cancelled.to_string());
            }
            // The last attempt's error is already recorded
            Err(e) => warn!(error = %e, "Download gave up"),
        }
        progress.mark_done();

        result
    }

    async fn run_attempts(
        &self,
        url: &str,
        progress: &DownloadProgress,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        let max_attempts = self.backoff.max_attempts();
        let mut last_error = None;

        for (attempt, delay) in self.backoff.schedule() {
            if !delay.is_zero() {
                debug!(attempt = attempt + 1, ?delay, "Waiting before retry");
                tokio::select! {
                    () = cancel.cancelled() => return Err(DownloadError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }

            progress.reset_attempt();
            match self.attempt(url, progress, cancel).await {
                Ok(path) => return Ok(path),
                Err(Abort::Cancelled) => {
                    info!(attempt = attempt + 1, "Download cancelled mid-transfer");
                    return Err(DownloadError::Cancelled);
                }
                Err(Abort::Failed(e)) => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        status = e.status(),
                        error = %e,
                        "Download attempt failed"
                    );
                    if let Some(status) = e.status() {
                        progress.set_http_status(status);
                    }
                    progress.set_last_error(e.to_string());
                    last_error = Some(e);
                }
            }
        }

        let last = last_error
            .unwrap_or_else(|| AttemptError::Transport("no attempt was made".to_string()));
        Err(DownloadError::Exhausted {
            attempts: max_attempts,
            last,
        })
    }

    async fn attempt(
        &self,
        url: &str,
        progress: &DownloadProgress,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Abort> {
        let response = self.transport.open(url).await?;
        progress.set_http_status(response.status);

        if !(200..300).contains(&response.status) {
            return Err(AttemptError::from_status(response.status).into());
        }
        progress.set_total_bytes(response.content_length);

        let path = self
            .download_dir
            .join(format!("sora_{}.mp4", Uuid::new_v4().simple()));

        match self.stream_to_file(response.body, &path, progress, cancel).await {
            Ok(()) => Ok(path),
            Err(e) => {
                remove_partial(&path).await;
                Err(e)
            }
        }
    }

    async fn stream_to_file(
        &self,
        mut body: ByteStream,
        path: &Path,
        progress: &DownloadProgress,
        cancel: &CancellationToken,
    ) -> Result<(), Abort> {
        let mut file = File::create_new(path).await?;
        let mut buffer = BytesMut::with_capacity(self.chunk_size);

        loop {
            let piece = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Abort::Cancelled),
                piece = body.next() => piece,
            };
            let Some(piece) = piece else { break };
            buffer.extend_from_slice(&piece?);

            while buffer.len() >= self.chunk_size {
                let chunk = buffer.split_to(self.chunk_size);
                write_chunk(&mut file, &chunk, progress, cancel).await?;
            }
        }

        if !buffer.is_empty() {
            write_chunk(&mut file, &buffer, progress, cancel).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

async fn write_chunk(
    file: &mut File,
    chunk: &[u8],
    progress: &DownloadProgress,
    cancel: &CancellationToken,
) -> Result<(), Abort> {
    file.write_all(chunk).await?;
    if cancel.is_cancelled() {
        return Err(Abort::Cancelled);
    }
    progress.add_bytes(chunk.len() as u64);
    Ok(())
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial download"),
    }
}
