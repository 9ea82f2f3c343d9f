//! Client for the external video resolution API
//!
//! Turns a share page link into direct media URLs. A failed resolution is
//! treated as a property of the link, so nothing here retries.

use crate::config::RESOLVE_TIMEOUT_SECS;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned by [`ResolverClient::resolve`]
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The service answered with a non-success status
    #[error("resolver returned HTTP {0}")]
    Status(u16),
    /// The request timed out
    #[error("resolver request timed out")]
    Timeout,
    /// Connection or protocol failure
    #[error("resolver request failed: {0}")]
    Network(String),
    /// The body was not the expected JSON
    #[error("malformed resolver response: {0}")]
    Malformed(String),
}

/// Normalized answer of the resolution service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedVideo {
    /// High quality media URL (`videoUrlHQ`), served without watermark
    pub high_quality_url: Option<String>,
    /// Alternate media URL (`url`), the original render
    pub alternate_url: Option<String>,
}

impl ResolvedVideo {
    /// True when the service returned no usable URL
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.high_quality_url.is_none() && self.alternate_url.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct VideoInfoResponse {
    #[serde(rename = "videoUrlHQ", default)]
    video_url_hq: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// HTTP client for the resolution endpoint
#[derive(Clone)]
pub struct ResolverClient {
    http: HttpClient,
    endpoint: String,
}

impl ResolverClient {
    /// Creates a client for `endpoint` with the standard resolve timeout
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, Duration::from_secs(RESOLVE_TIMEOUT_SECS))
    }

    /// Creates a client with a custom whole-request timeout
    #[must_use]
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.into();
        let http = HttpClient::builder()
            .timeout(timeout)
            .default_headers(browser_headers(&endpoint))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Resolver client build failed; falling back to a default client");
                HttpClient::new()
            });

        Self { http, endpoint }
    }

    /// Resolves `link` into direct media URLs with a single request.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError` on a non-2xx status, timeout, network failure
    /// or a body that is not the expected JSON object.
    pub async fn resolve(&self, link: &str) -> Result<ResolvedVideo, ResolutionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "url": link }))
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Resolver rejected link");
            return Err(ResolutionError::Status(status.as_u16()));
        }

        let body: VideoInfoResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ResolutionError::Timeout
            } else {
                ResolutionError::Malformed(e.to_string())
            }
        })?;

        let resolved = ResolvedVideo {
            high_quality_url: non_empty(body.video_url_hq),
            alternate_url: non_empty(body.url),
        };
        debug!(
            has_hq = resolved.high_quality_url.is_some(),
            has_alt = resolved.alternate_url.is_some(),
            "Link resolved"
        );
        Ok(resolved)
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> ResolutionError {
    if e.is_timeout() {
        ResolutionError::Timeout
    } else {
        ResolutionError::Network(e.to_string())
    }
}

/// Headers the resolution service expects from its own web front-end
fn browser_headers(endpoint: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

    if let Ok(url) = reqwest::Url::parse(endpoint) {
        let origin = url.origin().ascii_serialization();
        if let Ok(value) = HeaderValue::from_str(&format!("{origin}/")) {
            headers.insert(REFERER, value);
        }
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(ORIGIN, value);
        }
    }

    headers
}
