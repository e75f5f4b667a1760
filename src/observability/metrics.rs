//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fetch_requests_total` (counter): transport attempts by method, status
//! - `fetch_retries_total` (counter): scheduled retries by error kind
//! - `cache_lookups_total` (counter): cache reads by resource, outcome
//! - `cache_invalidations_total` (counter): tag invalidations by tag
//! - `dedup_joins_total` (counter): callers attached to an in-flight request
//! - `background_refresh_total` (counter): background refreshes by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in and installed by the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "fetch_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_retry(kind: &'static str) {
    metrics::counter!("fetch_retries_total", "kind" => kind).increment(1);
}

pub fn record_cache_lookup(resource: &str, outcome: &'static str) {
    metrics::counter!(
        "cache_lookups_total",
        "resource" => resource.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_invalidation(tag: &str) {
    metrics::counter!("cache_invalidations_total", "tag" => tag.to_string()).increment(1);
}

pub fn record_dedup_join() {
    metrics::counter!("dedup_joins_total").increment(1);
}

pub fn record_background_refresh(outcome: &'static str) {
    metrics::counter!("background_refresh_total", "outcome" => outcome).increment(1);
}
