//! Fetch orchestrator.
//!
//! # Data Flow
//! ```text
//! Read-mostly accessor (vehicles, customers, companies, bulk):
//!     cache key → CacheStore::get_or_fetch
//!         miss → RequestDeduplicator::deduplicate
//!             → with_retry(transport) → envelope unwrap
//!         → stored with TTL + tags
//!
//! Straight-through accessor (paginated lists, single records, rentals):
//!     with_retry(transport) → envelope unwrap
//!
//! Write:
//!     with_retry(transport) → success → invalidate tags
//! ```
//!
//! # Design Decisions
//! - Cache, deduplicator, transport and credentials are injected through
//!   `ApiClientBuilder`; nothing is process-global
//! - Every public accessor returns `Result<T, ClassifiedError>`
//! - Protocol status keeps a durable last-known-good copy (see `protocols`)

pub mod bulk;
pub mod client;
pub mod companies;
pub mod customers;
pub mod protocols;
pub mod rentals;
pub mod types;
pub mod vehicles;

pub use client::{ApiClient, ApiClientBuilder, BuildError};
pub use protocols::{FileProtocolCache, MemoryProtocolCache, PROTOCOL_STATUS_KEY};
pub use types::*;

/// Cache invalidation tags.
pub mod tags {
    pub const VEHICLES: &str = "vehicles";
    pub const CUSTOMERS: &str = "customers";
    pub const COMPANIES: &str = "companies";
    pub const RENTALS: &str = "rentals";
    pub const BULK: &str = "bulk";
    pub const OWNERSHIP: &str = "ownership";
    pub const HISTORY: &str = "history";
}
