//! Resilient fetch layer for the rental backend.
//!
//! Deduplicated, tag-cached, retrying access to vehicles, customers,
//! companies, rentals, bulk aggregates and protocol status.

pub mod api;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use api::{ApiClient, ApiClientBuilder};
pub use config::ClientConfig;
pub use resilience::{ClassifiedError, ErrorKind};
