//! In-memory response cache with per-entry TTL.
//!
//! Entries are never mutated after insertion. Expired entries are dropped
//! lazily on read and by a periodic sweep task. Overlapping requests for
//! the same key may both compute; the last write wins.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

pub struct ResultCache<V> {
    inner: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone + Send + 'static> ResultCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a cached value. Returns None if absent or expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.inner.lock();
        let now = Instant::now();

        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
        }
        None
    }

    /// Insert a value with an explicit TTL, replacing any previous entry
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = Instant::now().checked_add(ttl);
        self.inner
            .lock()
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Insert a value with the cache's default TTL
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.inner.lock();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Start the periodic sweep. The task ends once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    tracing::debug!("Cache dropped, stopping sweeper");
                    break;
                };

                let removed = cache.purge_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = cache.len(), "Swept expired cache entries");
                }
            }
        })
    }
}

/// Deterministic key over the video id and every option that changes output
pub fn cache_key(
    video_id: &str,
    language: &str,
    skip_refinement: bool,
    generate_blog: bool,
    fallback_message: bool,
    prefer_alternative: bool,
) -> String {
    format!(
        "{}:{}:skip={}:blog={}:fallback={}:alt={}",
        video_id,
        language.to_lowercase(),
        skip_refinement as u8,
        generate_blog as u8,
        fallback_message as u8,
        prefer_alternative as u8
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_before_expiry() {
        let cache = ResultCache::new(Duration::from_secs(3600));
        cache.insert("k", "value".to_string());
        assert_eq!(cache.get("k").as_deref(), Some("value"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_miss_after_expiry() {
        let cache = ResultCache::new(Duration::from_secs(3600));
        cache.set("k", 7u32, Duration::ZERO);
        assert_eq!(cache.get("k"), None);
        // Lazy eviction on read
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_expire_independently() {
        let cache = ResultCache::new(Duration::from_secs(3600));
        cache.set("short", 1u32, Duration::ZERO);
        cache.set("long", 2u32, Duration::from_secs(60));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("long"), Some(2));
        assert_eq!(cache.get("short"), None);
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let cache = ResultCache::new(Duration::from_secs(u64::MAX));
        cache.insert("k", 1u32);
        cache.set("also", 2u32, Duration::MAX);

        assert_eq!(cache.purge_expired(), 0);
        assert_eq!(cache.get("k"), Some(1));
        assert_eq!(cache.get("also"), Some(2));
    }

    #[test]
    fn test_last_write_wins() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.insert("k", 1u32);
        cache.insert("k", 2u32);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_key_distinguishes_options() {
        let base = cache_key("dQw4w9WgXcQ", "en", false, false, false, false);
        let variants = [
            cache_key("dQw4w9WgXcQ", "es", false, false, false, false),
            cache_key("dQw4w9WgXcQ", "en", true, false, false, false),
            cache_key("dQw4w9WgXcQ", "en", false, true, false, false),
            cache_key("dQw4w9WgXcQ", "en", false, false, true, false),
            cache_key("dQw4w9WgXcQ", "en", false, false, false, true),
            cache_key("aaaaaaaaaaa", "en", false, false, false, false),
        ];

        for variant in &variants {
            assert_ne!(&base, variant);
        }
        assert_eq!(base, cache_key("dQw4w9WgXcQ", "EN", false, false, false, false));
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60)));
        cache.set("gone", 1u32, Duration::ZERO);
        cache.insert("kept", 2u32);

        let handle = cache.spawn_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("kept"), Some(2));

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper stops after the cache is dropped")
            .unwrap();
    }
}
