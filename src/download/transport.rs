//! HTTP transport used by the download engine
//!
//! The engine only needs a status, an optional length and a byte stream, so
//! the transport is a trait; production uses reqwest.

use super::error::AttemptError;
use crate::config::{DOWNLOAD_CONNECT_TIMEOUT_SECS, DOWNLOAD_READ_TIMEOUT_SECS};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{RANGE, USER_AGENT};
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::warn;

/// Body of a response as a stream of byte buffers
pub type ByteStream = BoxStream<'static, Result<Bytes, AttemptError>>;

/// Response head plus streaming body
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Declared content length
    pub content_length: Option<u64>,
    /// Body stream; not read for non-2xx statuses
    pub body: ByteStream,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens a streaming GET for one attempt
#[async_trait]
pub trait DownloadTransport: Send + Sync {
    /// Sends the request and returns once response headers arrive.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` when no response head could be obtained.
    async fn open(&self, url: &str) -> Result<TransportResponse, AttemptError>;
}

/// reqwest transport with a short connect and a long read budget
#[derive(Clone)]
pub struct ReqwestTransport {
    http: HttpClient,
}

impl ReqwestTransport {
    /// Transport with the standard connect/read timeouts
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(
            Duration::from_secs(DOWNLOAD_CONNECT_TIMEOUT_SECS),
            Duration::from_secs(DOWNLOAD_READ_TIMEOUT_SECS),
        )
    }

    /// Transport with custom timeouts
    #[must_use]
    pub fn with_timeouts(connect: Duration, read: Duration) -> Self {
        let http = HttpClient::builder()
            .connect_timeout(connect)
            .read_timeout(read)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Download client build failed; falling back to a client without timeouts");
                HttpClient::new()
            });
        Self { http }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DownloadTransport for ReqwestTransport {
    async fn open(&self, url: &str) -> Result<TransportResponse, AttemptError> {
        // Restarting from 0 every attempt; the header only helps range-aware CDNs
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, "Mozilla/5.0")
            .header(RANGE, "bytes=0-")
            .send()
            .await?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(AttemptError::from))
            .boxed();

        Ok(TransportResponse {
            status,
            content_length,
            body,
        })
    }
}
