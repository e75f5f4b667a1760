//! Handover/return protocol accessors.
//!
//! # Bulk status flow
//! ```text
//! bulk_protocol_status (deduplicated)
//!     durable cache fresh?  → return it, refresh durable copy in background
//!     otherwise             → load from API → persist → return
//!                             load failed   → last durable copy, even stale
//!                                             nothing saved → error
//! ```
//!
//! Protocol writes are not followed by local invalidation; the server push
//! channel reports them.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::api::client::{decode, ApiClient};
use crate::api::types::{ProtocolKind, ProtocolStatus, RentalProtocols};
use crate::cache::{FileDurableCache, MemoryDurableCache};
use crate::observability::metrics;
use crate::resilience::{ClassifiedError, RawFailure};
use crate::transport::extract_records;

pub const PROTOCOL_STATUS_KEY: &str = "bulk-protocol-status";

pub type FileProtocolCache = FileDurableCache<ProtocolStatus>;
pub type MemoryProtocolCache = MemoryDurableCache<ProtocolStatus>;

impl ApiClient {
    /// Protocol presence for every rental.
    pub async fn bulk_protocol_status(&self) -> Result<Vec<ProtocolStatus>, ClassifiedError> {
        let client = self.clone();
        self.inner
            .protocol_dedup
            .deduplicate(PROTOCOL_STATUS_KEY, move || async move { client.load_protocol_status().await })
            .await
    }

    /// Treat the durable protocol snapshot as stale; the next read goes to the API.
    pub fn invalidate_protocol_status(&self) {
        if let Some(durable) = &self.inner.protocol_cache {
            durable.mark_stale();
            tracing::debug!("Protocol status cache marked stale");
        }
    }

    pub async fn protocols_by_rental(&self, rental_id: &str) -> Result<RentalProtocols, ClassifiedError> {
        self.get(&format!("/protocols/rental/{}", rental_id)).await
    }

    pub async fn create_handover_protocol(&self, protocol: Value) -> Result<Value, ClassifiedError> {
        self.post_value("/protocols/handover", protocol).await
    }

    pub async fn create_return_protocol(&self, protocol: Value) -> Result<Value, ClassifiedError> {
        self.post_value("/protocols/return", protocol).await
    }

    pub async fn delete_protocol(&self, kind: ProtocolKind, protocol_id: &str) -> Result<(), ClassifiedError> {
        self.delete_value(&format!("/protocols/{}/{}", kind.as_str(), protocol_id))
            .await
            .map(drop)
    }

    async fn load_protocol_status(&self) -> Result<Vec<ProtocolStatus>, ClassifiedError> {
        let durable = self.inner.protocol_cache.as_ref();

        if let Some(records) = durable.filter(|c| c.is_fresh()).and_then(|c| c.get_cached()) {
            metrics::record_cache_lookup("protocol-status", "hit");
            self.spawn_protocol_refresh();
            return Ok(records);
        }
        metrics::record_cache_lookup("protocol-status", "miss");

        match self.fetch_protocol_status().await {
            Ok(records) => {
                self.persist_protocol_status(&records);
                Ok(records)
            }
            Err(e) => match durable.and_then(|c| c.get_cached()) {
                Some(records) => {
                    tracing::warn!(
                        error = %e,
                        records = records.len(),
                        "Protocol status load failed, serving last saved copy"
                    );
                    Ok(records)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch_protocol_status(&self) -> Result<Vec<ProtocolStatus>, ClassifiedError> {
        let payload = self.get_value("/protocols/bulk-status").await?;
        let records = extract_records(payload).ok_or_else(|| {
            ClassifiedError::from(RawFailure::InvalidResponse(
                "protocol status payload is neither a list nor {data: [...]}".into(),
            ))
        })?;
        if records.is_empty() {
            tracing::warn!("Protocol status endpoint returned no records");
        }
        decode(Value::Array(records))
    }

    fn persist_protocol_status(&self, records: &[ProtocolStatus]) {
        if let Some(durable) = &self.inner.protocol_cache {
            if let Err(e) = durable.set_cached(records) {
                tracing::warn!(error = %e, "Failed to save protocol status cache");
            }
        }
    }

    /// Refresh the durable copy without blocking the caller. One at a time.
    fn spawn_protocol_refresh(&self) {
        if self.inner.protocol_refreshing.swap(true, Ordering::AcqRel) {
            return;
        }

        let client = self.clone();
        tokio::spawn(async move {
            let _slot = RefreshSlot(&client.inner.protocol_refreshing);
            match client.fetch_protocol_status().await {
                Ok(records) => {
                    client.persist_protocol_status(&records);
                    metrics::record_background_refresh("ok");
                }
                Err(e) => {
                    metrics::record_background_refresh("failed");
                    tracing::warn!(error = %e, "Background protocol status refresh failed");
                }
            }
        });
    }
}

/// Frees the refresh slot when the task ends, including by panic.
struct RefreshSlot<'a>(&'a AtomicBool);

impl Drop for RefreshSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
