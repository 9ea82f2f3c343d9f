//! Retry schedule for the download engine

use crate::config::DOWNLOAD_RETRY_DELAYS_SECS;
use std::time::Duration;

/// Ordered delays, one per attempt; the first is applied before attempt one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    delays: Vec<Duration>,
}

impl BackoffPolicy {
    /// Schedule from explicit delays. An empty list still allows one attempt.
    #[must_use]
    pub fn new(delays: Vec<Duration>) -> Self {
        if delays.is_empty() {
            return Self {
                delays: vec![Duration::ZERO],
            };
        }
        Self { delays }
    }

    /// `attempts` tries with no waiting in between
    #[must_use]
    pub fn immediate(attempts: usize) -> Self {
        Self::new(vec![Duration::ZERO; attempts])
    }

    /// Number of attempts in the budget
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }

    /// Iterates `(attempt, delay)` pairs
    pub fn schedule(&self) -> impl Iterator<Item = (usize, Duration)> + '_ {
        self.delays.iter().copied().enumerate()
    }
}

impl Default for BackoffPolicy {
    /// `[0s, 2s, 5s, 10s]`
    fn default() -> Self {
        Self::new(
            DOWNLOAD_RETRY_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        )
    }
}
