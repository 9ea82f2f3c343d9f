//! Download error taxonomy
//!
//! [`AttemptError`] describes why one attempt failed and is always retried
//! while budget remains. [`DownloadError`] is what the engine finally returns.

use thiserror::Error;

/// Failure of a single connect-and-stream attempt
#[derive(Debug, Error)]
pub enum AttemptError {
    /// 401 or 403 from the CDN
    #[error("access denied by media server (HTTP {0})")]
    Unauthorized(u16),
    /// 404
    #[error("media not found (HTTP 404)")]
    NotFound,
    /// 429
    #[error("rate limited by media server (HTTP 429)")]
    RateLimited,
    /// Any 5xx
    #[error("media server error (HTTP {0})")]
    Server(u16),
    /// Any other non-2xx
    #[error("unexpected HTTP status {0}")]
    Http(u16),
    /// Connect or read budget exceeded
    #[error("transfer timed out: {0}")]
    Timeout(String),
    /// Connection reset, TLS failure and the like
    #[error("transfer failed: {0}")]
    Transport(String),
    /// Temp file could not be created or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AttemptError {
    /// Maps a non-2xx status to its class
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized(status),
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::Server(status),
            _ => Self::Http(status),
        }
    }

    /// Status code carried by HTTP classes
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(s) | Self::Server(s) | Self::Http(s) => Some(*s),
            Self::NotFound => Some(404),
            Self::RateLimited => Some(429),
            Self::Timeout(_) | Self::Transport(_) | Self::Io(_) => None,
        }
    }

    /// Whether the attempt died on a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Terminal result of a download invocation
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Cancelled mid-stream or between attempts; never retried
    #[error("download cancelled")]
    Cancelled,
    /// Every attempt failed
    #[error("download failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made
        attempts: usize,
        /// Error of the final attempt
        #[source]
        last: AttemptError,
    },
}

impl DownloadError {
    /// Error of the final attempt, if attempts were exhausted
    #[must_use]
    pub const fn last_attempt_error(&self) -> Option<&AttemptError> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Cancelled => None,
        }
    }

    /// Whether the final attempt timed out
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.last_attempt_error().is_some_and(AttemptError::is_timeout)
    }
}
