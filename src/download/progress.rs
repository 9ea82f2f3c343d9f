//! Shared state of one in-flight download
//!
//! Written by a single engine invocation, read by the progress reporter.
//! Counters are plain atomics; `done` is stored with `Release` and read with
//! `Acquire`, so an observer that sees it set also sees the final counters,
//! error and path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

const UNKNOWN_TOTAL: u64 = u64::MAX;
const NO_STATUS: u16 = 0;

/// Live counters of one download
#[derive(Debug)]
pub struct DownloadProgress {
    bytes_downloaded: AtomicU64,
    total_bytes: AtomicU64,
    done: AtomicBool,
    http_status: AtomicU16,
    last_error: Mutex<Option<String>>,
    local_path: Mutex<Option<PathBuf>>,
}

/// Point-in-time copy of [`DownloadProgress`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Bytes written in the current attempt
    pub bytes_downloaded: u64,
    /// Declared content length, if the server sent one
    pub total_bytes: Option<u64>,
    /// Terminal flag
    pub is_done: bool,
    /// Last observed response status
    pub http_status: Option<u16>,
    /// Last recorded error description
    pub last_error: Option<String>,
    /// Downloaded file, set only on success
    pub local_path: Option<PathBuf>,
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadProgress {
    /// Fresh state: nothing downloaded, total unknown, not done
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes_downloaded: AtomicU64::new(0),
            total_bytes: AtomicU64::new(UNKNOWN_TOTAL),
            done: AtomicBool::new(false),
            http_status: AtomicU16::new(NO_STATUS),
            last_error: Mutex::new(None),
            local_path: Mutex::new(None),
        }
    }

    /// Back to the initial state
    pub fn reset(&self) {
        self.reset_attempt();
        self.http_status.store(NO_STATUS, Ordering::Relaxed);
        *lock(&self.last_error) = None;
        *lock(&self.local_path) = None;
        self.done.store(false, Ordering::Release);
    }

    /// Clears the per-attempt counters
    pub fn reset_attempt(&self) {
        self.bytes_downloaded.store(0, Ordering::Relaxed);
        self.total_bytes.store(UNKNOWN_TOTAL, Ordering::Relaxed);
    }

    /// Adds a written chunk to the counter
    pub fn add_bytes(&self, n: u64) {
        self.bytes_downloaded.fetch_add(n, Ordering::Relaxed);
    }

    /// Records the declared content length
    pub fn set_total_bytes(&self, total: Option<u64>) {
        self.total_bytes
            .store(total.unwrap_or(UNKNOWN_TOTAL), Ordering::Relaxed);
    }

    /// Records the last response status
    pub fn set_http_status(&self, status: u16) {
        self.http_status.store(status, Ordering::Relaxed);
    }

    /// Records a human-readable error
    pub fn set_last_error(&self, error: impl Into<String>) {
        *lock(&self.last_error) = Some(error.into());
    }

    /// Records the finished file
    pub fn set_local_path(&self, path: &Path) {
        *lock(&self.local_path) = Some(path.to_path_buf());
    }

    /// Flips the terminal flag; must be the engine's last write
    pub fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Whether the download has finished, successfully or not
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Bytes written in the current attempt
    #[must_use]
    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded.load(Ordering::Relaxed)
    }

    /// Declared content length
    #[must_use]
    pub fn total_bytes(&self) -> Option<u64> {
        match self.total_bytes.load(Ordering::Relaxed) {
            UNKNOWN_TOTAL => None,
            total => Some(total),
        }
    }

    /// Last response status
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self.http_status.load(Ordering::Relaxed) {
            NO_STATUS => None,
            status => Some(status),
        }
    }

    /// Last recorded error
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Path of the finished file
    #[must_use]
    pub fn local_path(&self) -> Option<PathBuf> {
        lock(&self.local_path).clone()
    }

    /// Copies every field; `is_done` is read first so a `true` snapshot is final
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let is_done = self.is_done();
        ProgressSnapshot {
            bytes_downloaded: self.bytes_downloaded(),
            total_bytes: self.total_bytes(),
            is_done,
            http_status: self.http_status(),
            last_error: self.last_error(),
            local_path: self.local_path(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_progress_is_empty() {
        let progress = DownloadProgress::new();
        assert_eq!(progress.snapshot(), ProgressSnapshot::default());
    }

    #[test]
    fn test_reset_attempt_keeps_status_and_error() {
        let progress = DownloadProgress::new();
        progress.set_total_bytes(Some(100));
        progress.add_bytes(40);
        progress.set_http_status(503);
        progress.set_last_error("server error");

        progress.reset_attempt();

        let snap = progress.snapshot();
        assert_eq!(snap.bytes_downloaded, 0);
        assert_eq!(snap.total_bytes, None);
        assert_eq!(snap.http_status, Some(503));
        assert_eq!(snap.last_error.as_deref(), Some("server error"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let progress = DownloadProgress::new();
        progress.add_bytes(10);
        progress.set_http_status(200);
        progress.set_local_path(Path::new("/tmp/x.mp4"));
        progress.mark_done();

        progress.reset();

        assert_eq!(progress.snapshot(), ProgressSnapshot::default());
    }

    #[test]
    fn test_done_visible_across_threads() {
        let progress = std::sync::Arc::new(DownloadProgress::new());
        let writer = progress.clone();

        let handle = std::thread::spawn(move || {
            writer.add_bytes(5);
            writer.set_local_path(Path::new("/tmp/done.mp4"));
            writer.mark_done();
        });
        handle.join().ok();

        let snap = progress.snapshot();
        assert!(snap.is_done);
        assert_eq!(snap.bytes_downloaded, 5);
        assert_eq!(snap.local_path, Some(PathBuf::from("/tmp/done.mp4")));
    }
}
