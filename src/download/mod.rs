//! Resilient download pipeline
//!
//! The [`DownloadEngine`] fetches a URL into a temporary file with bounded
//! retries, writing live counters into a shared [`DownloadProgress`] that the
//! [`reporter`] renders into a status message.

pub mod backoff;
pub mod engine;
pub mod error;
pub mod progress;
pub mod reporter;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use engine::DownloadEngine;
pub use error::{AttemptError, DownloadError};
pub use progress::{DownloadProgress, ProgressSnapshot};
pub use reporter::{ProgressReporter, StatusSink};
pub use transport::{DownloadTransport, ReqwestTransport, TransportResponse};
