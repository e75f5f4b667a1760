//! Aggregate reads: the dashboard bulk payload and ownership history.

use crate::api::client::ApiClient;
use crate::api::tags;
use crate::api::types::{BulkData, OwnershipHistory};
use crate::cache::{cache_key, CacheOptions, QueryParams};
use crate::resilience::ClassifiedError;

pub const BULK_DATA_KEY: &str = "bulk-data";
pub const OWNERSHIP_HISTORY_KEY: &str = "bulk-vehicle-ownership-history";

impl ApiClient {
    /// Every dashboard collection in one request.
    ///
    /// Invalidated by writes to vehicles, rentals, customers, or any `bulk` write.
    pub async fn bulk_data(&self) -> Result<BulkData, ClassifiedError> {
        let key = cache_key(BULK_DATA_KEY, &QueryParams::new());
        let options = CacheOptions::new(self.ttls().bulk_ttl())
            .tags([tags::BULK, tags::VEHICLES, tags::RENTALS, tags::CUSTOMERS]);
        self.cached("/bulk/data", &key, BULK_DATA_KEY, options).await
    }

    pub async fn vehicle_ownership_history(&self) -> Result<OwnershipHistory, ClassifiedError> {
        let key = cache_key("vehicle-ownership", &QueryParams::new());
        let options = CacheOptions::new(self.ttls().ownership_ttl())
            .tags([tags::VEHICLES, tags::OWNERSHIP, tags::HISTORY]);
        self.cached("/vehicles/bulk-ownership-history", &key, OWNERSHIP_HISTORY_KEY, options)
            .await
    }
}
