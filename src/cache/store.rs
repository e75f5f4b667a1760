//! Tagged TTL cache with stale-while-revalidate.
//!
//! # Responsibilities
//! - Serve live entries without touching the producer
//! - Populate on miss, storing the value with its TTL and tags
//! - Refresh aging entries in a detached task when asked to
//! - Drop every entry carrying a tag on `invalidate_tag`
//!
//! # Design Decisions
//! - Expired entries are evicted lazily, on the read that finds them
//! - A failing producer never touches the existing entry
//! - Each tag and each key carries an epoch; a producer that started before
//!   its key or one of its tags was invalidated does not write its result back

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::cache::entry::CacheEntry;
use crate::observability::metrics;

/// How a value should be stored.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub ttl: Duration,
    pub tags: Vec<String>,
    /// Refresh in the background when a hit finds an aging entry.
    pub background: bool,
}

impl CacheOptions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tags: Vec::new(),
            background: false,
        }
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn background(mut self, enabled: bool) -> Self {
        self.background = enabled;
        self
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub background_refreshes: u64,
    pub entries: usize,
}

/// Invalidation counters a fetch observed when it started.
///
/// Two fetches of the same key with equal snapshots saw the same
/// invalidations, so their results are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochSnapshot {
    key: u64,
    tags: Vec<u64>,
}

impl fmt::Display for EpochSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        for tag in &self.tags {
            write!(f, ".{}", tag)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Epochs {
    tags: HashMap<String, u64>,
    keys: HashMap<String, u64>,
}

impl Epochs {
    fn snapshot(&self, key: &str, tags: &[String]) -> EpochSnapshot {
        EpochSnapshot {
            key: self.keys.get(key).copied().unwrap_or(0),
            tags: tags
                .iter()
                .map(|tag| self.tags.get(tag).copied().unwrap_or(0))
                .collect(),
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    background_refreshes: AtomicU64,
}

/// Keyed store of time-bounded, tagged entries.
pub struct CacheStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
    /// Invalidation counters per tag and per key. Also serializes writes
    /// against invalidations.
    epochs: Mutex<Epochs>,
    refresh_after_ratio: f64,
    counters: Counters,
}

impl<V> CacheStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a store; hits on entries older than `refresh_after_ratio * ttl`
    /// trigger a background refresh when the caller asks for one.
    pub fn new(refresh_after_ratio: f64) -> Self {
        Self {
            entries: DashMap::new(),
            epochs: Mutex::new(Epochs::default()),
            refresh_after_ratio,
            counters: Counters::default(),
        }
    }

    /// Return the live value for `key`, or populate it from `producer`.
    ///
    /// With `options.background`, a hit on an aging entry also runs
    /// `producer` in a detached task and replaces the entry on success. The
    /// caller gets the cached value either way and never sees a refresh error.
    pub async fn get_or_fetch<F, Fut, E>(
        self: &Arc<Self>,
        key: &str,
        producer: F,
        options: CacheOptions,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let now = Instant::now();
        let mut refresh = false;

        let hit = match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                if options.background && entry.wants_refresh(now, self.refresh_after_ratio) {
                    entry.refresh_in_flight = true;
                    refresh = true;
                }
                Some(entry.value.clone())
            }
            _ => None,
        };

        if let Some(value) = hit {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_lookup(resource_of(key), "hit");
            if refresh {
                self.spawn_refresh(key.to_string(), producer, options);
            }
            return Ok(value);
        }

        self.evict_if_expired(key, now);
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(resource_of(key), "miss");
        tracing::debug!(key = %key, "Cache miss");

        let epochs = self.epoch_snapshot(key, &options.tags);
        let value = producer().await?;
        self.write_if_current(key, value.clone(), &options, &epochs);
        Ok(value)
    }

    fn spawn_refresh<F, Fut, E>(self: &Arc<Self>, key: String, producer: F, options: CacheOptions)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let store = Arc::clone(self);
        let epochs = self.epoch_snapshot(&key, &options.tags);
        self.counters.background_refreshes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "Refreshing cache entry in background");

        tokio::spawn(async move {
            match producer().await {
                Ok(value) => {
                    store.write_if_current(&key, value, &options, &epochs);
                    metrics::record_background_refresh("ok");
                }
                Err(e) => {
                    if let Some(mut entry) = store.entries.get_mut(&key) {
                        entry.refresh_in_flight = false;
                    }
                    metrics::record_background_refresh("failed");
                    tracing::warn!(key = %key, error = %e, "Background refresh failed, keeping cached value");
                }
            }
        });
    }

    /// Live value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());
        if value.is_none() {
            self.evict_if_expired(key, now);
        }
        value
    }

    /// Store `value` unconditionally, replacing any previous entry.
    pub fn insert(&self, key: &str, value: V, options: &CacheOptions) {
        let _epochs = self.lock_epochs();
        self.entries.insert(
            key.to_string(),
            CacheEntry::new(value, options.ttl, options.tags.iter().cloned()),
        );
    }

    /// Remove the entry stored under `key`. A fetch for `key` already in
    /// flight will not write its result back.
    pub fn invalidate_key(&self, key: &str) -> bool {
        let mut epochs = self.lock_epochs();
        *epochs.keys.entry(key.to_string()).or_insert(0) += 1;
        let removed = self.entries.remove(key).is_some();
        drop(epochs);

        tracing::debug!(key = %key, removed, "Invalidated cache key");
        removed
    }

    /// Remove every entry carrying `tag`. Unknown tags are a no-op.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut epochs = self.lock_epochs();
        *epochs.tags.entry(tag.to_string()).or_insert(0) += 1;

        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.has_tag(tag);
            if !keep {
                removed += 1;
            }
            keep
        });
        drop(epochs);

        metrics::record_invalidation(tag);
        tracing::debug!(tag = %tag, removed, "Invalidated cache tag");
        removed
    }

    /// Invalidate several tags; returns the total number of entries removed.
    pub fn invalidate_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter().map(|tag| self.invalidate_tag(tag.as_ref())).sum()
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            background_refreshes: self.counters.background_refreshes.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn evict_if_expired(&self, key: &str, now: Instant) {
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
    }

    /// Current invalidation counters for `key` and `tags`.
    pub fn epoch_snapshot(&self, key: &str, tags: &[String]) -> EpochSnapshot {
        self.lock_epochs().snapshot(key, tags)
    }

    fn lock_epochs(&self) -> MutexGuard<'_, Epochs> {
        self.epochs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_if_current(&self, key: &str, value: V, options: &CacheOptions, snapshot: &EpochSnapshot) -> bool {
        let epochs = self.lock_epochs();
        if epochs.snapshot(key, &options.tags) != *snapshot {
            tracing::debug!(key = %key, "Invalidated while fetching, not caching result");
            if let Some(mut entry) = self.entries.get_mut(key) {
                entry.refresh_in_flight = false;
            }
            return false;
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry::new(value, options.ttl, options.tags.iter().cloned()),
        );
        true
    }
}

/// Resource part of a key (everything before the query string).
fn resource_of(key: &str) -> &str {
    key.split('?').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    const TTL: Duration = Duration::from_secs(600);

    fn store() -> Arc<CacheStore<String>> {
        Arc::new(CacheStore::new(0.5))
    }

    fn counting_producer(
        calls: &Arc<AtomicU32>,
        value: &'static str,
    ) -> impl FnOnce() -> std::future::Ready<Result<String, String>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(value.to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_does_not_invoke_producer() {
        let cache = store();
        let calls = Arc::new(AtomicU32::new(0));
        let options = CacheOptions::new(TTL).tags(["vehicles"]);

        let first = cache.get_or_fetch("vehicles", counting_producer(&calls, "a"), options.clone()).await;
        let second = cache.get_or_fetch("vehicles", counting_producer(&calls, "b"), options).await;

        assert_eq!(first.unwrap(), "a");
        assert_eq!(second.unwrap(), "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let cache = store();
        let calls = Arc::new(AtomicU32::new(0));
        let options = CacheOptions::new(Duration::from_secs(10));

        cache.get_or_fetch("k", counting_producer(&calls, "a"), options.clone()).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        let value = cache.get_or_fetch("k", counting_producer(&calls, "b"), options).await.unwrap();

        assert_eq!(value, "b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_tag_forces_next_read_to_fetch() {
        let cache = store();
        let calls = Arc::new(AtomicU32::new(0));
        let tagged = CacheOptions::new(TTL).tags(["bulk", "vehicles"]);
        let other = CacheOptions::new(TTL).tags(["companies"]);

        cache.get_or_fetch("bulk-data", counting_producer(&calls, "a"), tagged.clone()).await.unwrap();
        cache.get_or_fetch("companies", counting_producer(&calls, "c"), other).await.unwrap();

        assert_eq!(cache.invalidate_tag("vehicles"), 1);
        assert!(cache.get("bulk-data").is_none());
        assert_eq!(cache.get("companies").as_deref(), Some("c"));

        let value = cache.get_or_fetch("bulk-data", counting_producer(&calls, "b"), tagged).await.unwrap();
        assert_eq!(value, "b");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_noop() {
        let cache = store();
        cache.insert("k", "v".to_string(), &CacheOptions::new(TTL).tags(["a"]));
        assert_eq!(cache.invalidate_tag("nope"), 0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_producer_caches_nothing() {
        let cache = store();
        let calls = Arc::new(AtomicU32::new(0));
        let options = CacheOptions::new(Duration::from_secs(10));

        let result = cache
            .get_or_fetch("k", || async { Err::<String, _>("boom".to_string()) }, options.clone())
            .await;
        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.is_empty());

        let value = cache.get_or_fetch("k", counting_producer(&calls, "a"), options).await;
        assert_eq!(value.unwrap(), "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh_replaces_value() {
        let cache = store();
        let calls = Arc::new(AtomicU32::new(0));
        let options = CacheOptions::new(Duration::from_secs(10)).background(true);

        cache.get_or_fetch("k", counting_producer(&calls, "a"), options.clone()).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        let stale = cache.get_or_fetch("k", counting_producer(&calls, "b"), options.clone()).await.unwrap();
        assert_eq!(stale, "a");

        tokio::task::yield_now().await;
        assert_eq!(cache.get("k").as_deref(), Some("b"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().background_refreshes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh_failure_keeps_value() {
        let cache = store();
        let options = CacheOptions::new(Duration::from_secs(10)).background(true);
        cache.insert("k", "good".to_string(), &options);
        tokio::time::advance(Duration::from_secs(6)).await;

        let value = cache
            .get_or_fetch("k", || async { Err::<String, _>("refresh failed".to_string()) }, options)
            .await;
        assert_eq!(value.unwrap(), "good");

        tokio::task::yield_now().await;
        assert_eq!(cache.get("k").as_deref(), Some("good"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_hit_skips_background_refresh() {
        let cache = store();
        let calls = Arc::new(AtomicU32::new(0));
        let options = CacheOptions::new(Duration::from_secs(10)).background(true);

        cache.get_or_fetch("k", counting_producer(&calls, "a"), options.clone()).await.unwrap();
        cache.get_or_fetch("k", counting_producer(&calls, "b"), options).await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_not_cached_when_tag_invalidated_mid_fetch() {
        let cache = store();
        let options = CacheOptions::new(TTL).tags(["vehicles"]);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let pending = {
            let cache = Arc::clone(&cache);
            let options = options.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(
                        "vehicles",
                        move || async move {
                            let _ = rx.await;
                            Ok::<_, String>("stale".to_string())
                        },
                        options,
                    )
                    .await
            })
        };

        tokio::task::yield_now().await;
        cache.invalidate_tag("vehicles");
        tx.send(()).unwrap();

        assert_eq!(pending.await.unwrap().unwrap(), "stale");
        assert!(cache.get("vehicles").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_not_cached_when_key_invalidated_mid_fetch() {
        let cache = store();
        let options = CacheOptions::new(TTL);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let pending = {
            let cache = Arc::clone(&cache);
            let options = options.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(
                        "vehicle/v1",
                        move || async move {
                            let _ = rx.await;
                            Ok::<_, String>("stale".to_string())
                        },
                        options,
                    )
                    .await
            })
        };

        tokio::task::yield_now().await;
        assert!(!cache.invalidate_key("vehicle/v1"));
        tx.send(()).unwrap();

        assert_eq!(pending.await.unwrap().unwrap(), "stale");
        assert!(cache.get("vehicle/v1").is_none());
    }

    #[test]
    fn test_epoch_snapshot_moves_with_invalidation() {
        let cache = CacheStore::<String>::new(0.5);
        let tags = vec!["vehicles".to_string(), "bulk".to_string()];
        let before = cache.epoch_snapshot("bulk-data", &tags);
        assert_eq!(before.to_string(), "0.0.0");

        cache.invalidate_tag("companies");
        assert_eq!(cache.epoch_snapshot("bulk-data", &tags), before);

        cache.invalidate_tag("bulk");
        cache.invalidate_key("bulk-data");
        let after = cache.epoch_snapshot("bulk-data", &tags);
        assert_ne!(after, before);
        assert_eq!(after.to_string(), "1.0.1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = store();
        cache.insert("short", "a".to_string(), &CacheOptions::new(Duration::from_secs(1)));
        cache.insert("long", "b".to_string(), &CacheOptions::new(TTL));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }
}
