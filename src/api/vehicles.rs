//! Vehicle accessors.

use crate::api::client::{encode, ApiClient};
use crate::api::tags;
use crate::api::types::{PageQuery, Paginated, Vehicle, VehicleFilter};
use crate::cache::{cache_key, CacheOptions, QueryParams};
use crate::resilience::ClassifiedError;
use crate::transport::Method;

const WRITE_TAGS: &[&str] = &[tags::VEHICLES, tags::BULK];

impl ApiClient {
    /// Vehicle list. The default listing is cached with background refresh;
    /// listings including removed or private vehicles always hit the network.
    pub async fn vehicles(&self, filter: VehicleFilter) -> Result<Vec<Vehicle>, ClassifiedError> {
        let params = QueryParams::new()
            .set_opt("includeRemoved", filter.include_removed.then_some(true))
            .set_opt("includePrivate", filter.include_private.then_some(true));
        let path = params.apply_to("/vehicles");

        if !filter.is_default() {
            return self.get(&path).await;
        }

        let key = cache_key(tags::VEHICLES, &params);
        let options = CacheOptions::new(self.ttls().vehicles_ttl())
            .tags([tags::VEHICLES])
            .background(true);
        self.cached(&path, &key, &key, options).await
    }

    pub async fn vehicle(&self, id: &str) -> Result<Vehicle, ClassifiedError> {
        self.get(&format!("/vehicles/{}", id)).await
    }

    pub async fn vehicles_paginated(&self, query: &PageQuery) -> Result<Paginated<Vehicle>, ClassifiedError> {
        self.get(&QueryParams::from_serialize(query).apply_to("/vehicles/paginated"))
            .await
    }

    pub async fn create_vehicle(&self, vehicle: &Vehicle) -> Result<(), ClassifiedError> {
        self.mutate(Method::Post, "/vehicles", Some(encode(vehicle)?), WRITE_TAGS)
            .await
            .map(drop)
    }

    pub async fn update_vehicle(&self, vehicle: &Vehicle) -> Result<(), ClassifiedError> {
        let path = format!("/vehicles/{}", vehicle.id);
        self.mutate(Method::Put, &path, Some(encode(vehicle)?), WRITE_TAGS)
            .await
            .map(drop)
    }

    pub async fn delete_vehicle(&self, id: &str) -> Result<(), ClassifiedError> {
        self.mutate(Method::Delete, &format!("/vehicles/{}", id), None, WRITE_TAGS)
            .await
            .map(drop)
    }

    /// Import vehicles in one request; returns the backend's import report.
    pub async fn batch_import_vehicles(&self, vehicles: &[Vehicle]) -> Result<serde_json::Value, ClassifiedError> {
        let body = serde_json::json!({ "vehicles": encode(vehicles)? });
        self.mutate(Method::Post, "/vehicles/batch-import", Some(body), WRITE_TAGS)
            .await
    }
}
