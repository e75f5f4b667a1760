//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, delays ordered, ratios in range)
//! - Check the API base URL is usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("api.base_url '{0}' is not an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("retry.max_delay_ms ({max}) is smaller than retry.base_delay_ms ({base})")]
    DelayOrder { base: u64, max: u64 },

    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("protocol_cache.path must not be empty when the durable cache is enabled")]
    MissingCachePath,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.api.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
        _ => errors.push(ValidationError::InvalidBaseUrl(config.api.base_url.clone())),
    }

    let positive = [
        ("api.request_timeout_secs", config.api.request_timeout_secs),
        ("retry.base_delay_ms", config.retry.base_delay_ms),
        ("cache.vehicles_ttl_secs", config.cache.vehicles_ttl_secs),
        ("cache.customers_ttl_secs", config.cache.customers_ttl_secs),
        ("cache.companies_ttl_secs", config.cache.companies_ttl_secs),
        ("cache.bulk_ttl_secs", config.cache.bulk_ttl_secs),
        ("cache.ownership_ttl_secs", config.cache.ownership_ttl_secs),
        ("protocol_cache.max_age_secs", config.protocol_cache.max_age_secs),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::NotPositive { field });
        }
    }

    if config.retry.max_delay_ms < config.retry.base_delay_ms {
        errors.push(ValidationError::DelayOrder {
            base: config.retry.base_delay_ms,
            max: config.retry.max_delay_ms,
        });
    }

    let jitter = config.retry.jitter_ratio;
    if !(0.0..=1.0).contains(&jitter) {
        errors.push(ValidationError::OutOfRange {
            field: "retry.jitter_ratio",
            value: jitter,
            min: 0.0,
            max: 1.0,
        });
    }

    let refresh = config.cache.refresh_after_ratio;
    if !(refresh > 0.0 && refresh <= 1.0) {
        errors.push(ValidationError::OutOfRange {
            field: "cache.refresh_after_ratio",
            value: refresh,
            min: 0.0,
            max: 1.0,
        });
    }

    if config.protocol_cache.enabled && config.protocol_cache.path.trim().is_empty() {
        errors.push(ValidationError::MissingCachePath);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ClientConfig::default();
        config.api.base_url = "not a url".to_string();
        config.retry.base_delay_ms = 5000;
        config.retry.max_delay_ms = 100;
        config.cache.bulk_ttl_secs = 0;
        config.retry.jitter_ratio = 2.0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::NotPositive { field: "cache.bulk_ttl_secs" }));
        assert!(errors.contains(&ValidationError::DelayOrder { base: 5000, max: 100 }));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let mut config = ClientConfig::default();
        config.api.base_url = "ftp://files.example.com".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidBaseUrl(_)));
    }

    #[test]
    fn test_empty_cache_path_only_matters_when_enabled() {
        let mut config = ClientConfig::default();
        config.protocol_cache.path = String::new();
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::MissingCachePath]
        );

        config.protocol_cache.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
