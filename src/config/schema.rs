//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the fetch client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote API endpoint and credential settings.
    pub api: ApiConfig,

    /// Retry policy applied to every transport call.
    pub retry: RetryConfig,

    /// In-memory cache TTLs per resource.
    pub cache: CacheConfig,

    /// Durable protocol-status cache.
    pub protocol_cache: ProtocolCacheConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Remote API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL all endpoint paths are appended to.
    pub base_url: String,

    /// Per-attempt transport deadline in seconds.
    pub request_timeout_secs: u64,

    /// Environment variable consulted per request for the bearer token.
    pub token_env: String,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001/api".to_string(),
            request_timeout_secs: 30,
            token_env: "RENTAL_API_TOKEN".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Random jitter added to each delay, as a fraction of it (0.0 disables).
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 8000,
            jitter_ratio: 0.0,
        }
    }
}

/// Cache TTLs per resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub vehicles_ttl_secs: u64,
    pub customers_ttl_secs: u64,
    pub companies_ttl_secs: u64,
    pub bulk_ttl_secs: u64,
    pub ownership_ttl_secs: u64,

    /// Fraction of the TTL after which a hit also kicks a background refresh.
    pub refresh_after_ratio: f64,
}

impl CacheConfig {
    pub fn vehicles_ttl(&self) -> Duration {
        Duration::from_secs(self.vehicles_ttl_secs)
    }

    pub fn customers_ttl(&self) -> Duration {
        Duration::from_secs(self.customers_ttl_secs)
    }

    pub fn companies_ttl(&self) -> Duration {
        Duration::from_secs(self.companies_ttl_secs)
    }

    pub fn bulk_ttl(&self) -> Duration {
        Duration::from_secs(self.bulk_ttl_secs)
    }

    pub fn ownership_ttl(&self) -> Duration {
        Duration::from_secs(self.ownership_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            vehicles_ttl_secs: 10 * 60,
            customers_ttl_secs: 5 * 60,
            companies_ttl_secs: 30 * 60, // companies rarely change
            bulk_ttl_secs: 10 * 60,
            ownership_ttl_secs: 15 * 60,
            refresh_after_ratio: 0.5,
        }
    }
}

/// Durable protocol-status cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolCacheConfig {
    /// Persist protocol status to disk (otherwise kept in memory only).
    pub enabled: bool,

    /// File the records are persisted to.
    pub path: String,

    /// Age in seconds after which the persisted records are no longer fresh.
    pub max_age_secs: u64,
}

impl ProtocolCacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for ProtocolCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "protocol_status_cache.json".to_string(),
            max_age_secs: 5 * 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Install the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}
