//! Cache entry with TTL and invalidation tags.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

/// A cached value with its expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
    pub tags: HashSet<String>,
    /// Set while a background refresh for this entry is running.
    pub refresh_in_flight: bool,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration, tags: impl IntoIterator<Item = String>) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
            tags: tags.into_iter().collect(),
            refresh_in_flight: false,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Whether the entry may still be served.
    pub fn is_live(&self, now: Instant) -> bool {
        self.age(now) < self.ttl
    }

    /// Whether a hit should also kick a background refresh.
    pub fn wants_refresh(&self, now: Instant, refresh_after_ratio: f64) -> bool {
        !self.refresh_in_flight && self.age(now) >= self.ttl.mul_f64(refresh_after_ratio)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
