//! Per-user cache of resolved download links
//!
//! Entries live for a fixed TTL. Expiry is checked against an injectable
//! [`Clock`] and expired entries are evicted lazily on lookup; the moka
//! TTL only bounds how long abandoned entries occupy memory.

use moka::future::Cache;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Source of "now" for expiry checks
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.base + offset
    }
}

/// Resolved download options for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Telegram user ID
    pub user_id: i64,
    /// Link the user originally sent
    pub source_link: Option<String>,
    /// High quality media URL (`videoUrlHQ`), served without watermark
    pub high_quality_url: Option<String>,
    /// Alternate media URL (`url`), the original render
    pub alternate_url: Option<String>,
    /// When the links were resolved
    pub created_at: Instant,
}

impl CacheEntry {
    /// True when neither URL is present
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.high_quality_url.is_none() && self.alternate_url.is_none()
    }
}

/// TTL-bounded map from user ID to their last resolved links
#[derive(Clone)]
pub struct LinkCache {
    cache: Cache<i64, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl LinkCache {
    /// Creates a cache on the system clock
    ///
    /// # Examples
    ///
    /// ```
    /// use sora_fetch_bot::cache::LinkCache;
    ///
    /// let cache = LinkCache::new(600, 10_000);
    /// ```
    #[must_use]
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        Self::with_clock(
            Duration::from_secs(ttl_secs),
            max_capacity,
            Arc::new(SystemClock),
        )
    }

    /// Creates a cache that reads time from `clock`
    #[must_use]
    pub fn with_clock(ttl: Duration, max_capacity: u64, clock: Arc<dyn Clock>) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache, ttl, clock }
    }

    /// Stores or overwrites the links for `user_id`
    pub async fn put(
        &self,
        user_id: i64,
        source_link: Option<String>,
        high_quality_url: Option<String>,
        alternate_url: Option<String>,
    ) {
        let entry = CacheEntry {
            user_id,
            source_link,
            high_quality_url,
            alternate_url,
            created_at: self.clock.now(),
        };
        self.cache.insert(user_id, entry).await;
    }

    /// Returns the entry for `user_id` unless it is missing or expired
    pub async fn get(&self, user_id: i64) -> Option<CacheEntry> {
        let entry = self.cache.get(&user_id).await?;

        let age = self.clock.now().saturating_duration_since(entry.created_at);
        if age > self.ttl {
            debug!(user_id, age_secs = age.as_secs(), "Evicting expired link entry");
            self.cache.invalidate(&user_id).await;
            return None;
        }

        Some(entry)
    }

    /// Removes the entry for `user_id`, if any
    pub async fn delete(&self, user_id: i64) {
        self.cache.invalidate(&user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_clock() -> (LinkCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = LinkCache::with_clock(Duration::from_secs(600), 100, clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_get_without_put_is_absent() {
        let (cache, _) = cache_with_clock();
        assert!(cache.get(42).await.is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_returns_stored_links() {
        let (cache, _) = cache_with_clock();

        cache
            .put(
                42,
                Some("https://sora.chatgpt.com/p/s_abc".to_string()),
                Some("https://cdn/x.mp4".to_string()),
                Some("https://cdn/y.mp4".to_string()),
            )
            .await;

        let Some(entry) = cache.get(42).await else {
            panic!("entry should be present");
        };
        assert_eq!(entry.user_id, 42);
        assert_eq!(
            entry.source_link.as_deref(),
            Some("https://sora.chatgpt.com/p/s_abc")
        );
        assert_eq!(entry.high_quality_url.as_deref(), Some("https://cdn/x.mp4"));
        assert_eq!(entry.alternate_url.as_deref(), Some("https://cdn/y.mp4"));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock();
        cache
            .put(7, None, Some("https://cdn/x.mp4".to_string()), None)
            .await;

        clock.advance(Duration::from_secs(600));
        assert!(cache.get(7).await.is_some(), "exactly TTL old is still valid");

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(7).await.is_none());

        // Lazily evicted, stays absent
        assert!(cache.get(7).await.is_none());
    }

    #[tokio::test]
    async fn test_put_refreshes_timestamp() {
        let (cache, clock) = cache_with_clock();
        cache.put(7, None, Some("old".to_string()), None).await;

        clock.advance(Duration::from_secs(500));
        cache.put(7, None, Some("new".to_string()), None).await;
        clock.advance(Duration::from_secs(500));

        let entry = cache.get(7).await;
        assert_eq!(
            entry.and_then(|e| e.high_quality_url).as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_per_user() {
        let (cache, _) = cache_with_clock();
        cache.put(1, None, Some("a".to_string()), None).await;
        cache.put(2, None, Some("b".to_string()), None).await;

        cache.delete(1).await;
        cache.delete(1).await;

        assert!(cache.get(1).await.is_none());
        assert!(cache.get(2).await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_distinct_keys() {
        let (cache, _) = cache_with_clock();

        let mut handles = Vec::new();
        for user in 0..32_i64 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.put(user, None, Some(format!("u{user}")), None).await;
                cache.get(user).await
            }));
        }

        for (user, handle) in handles.into_iter().enumerate() {
            let entry = handle.await.ok().flatten();
            assert_eq!(
                entry.and_then(|e| e.high_quality_url),
                Some(format!("u{user}"))
            );
        }
    }
}
