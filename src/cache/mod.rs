//! Caching subsystem.
//!
//! # Data Flow
//! ```text
//! Read:
//!     key.rs (canonical key from resource + params)
//!     → store.rs: live entry? → return (maybe spawn background refresh)
//!                 miss        → producer → store with TTL + tags → return
//!
//! Invalidation (mutations, push channel):
//!     invalidate_tag(tag) → every entry carrying tag removed
//!
//! Protocol status:
//!     durable.rs (persisted last known-good records, age-based freshness)
//! ```
//!
//! # Design Decisions
//! - The store is an explicit object injected into the client, no globals
//! - Tags are many-to-many; one entry may carry several
//! - Background refresh failures are logged, never surfaced

pub mod durable;
pub mod entry;
pub mod key;
pub mod store;

pub use durable::{DurableCache, DurableCacheError, DurableCacheInfo, FileDurableCache, MemoryDurableCache};
pub use entry::CacheEntry;
pub use key::{cache_key, QueryParams};
pub use store::{CacheOptions, CacheStats, CacheStore, EpochSnapshot};
