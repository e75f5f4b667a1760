//! Customer accessors.

use crate::api::client::{encode, ApiClient};
use crate::api::tags;
use crate::api::types::{Customer, PageQuery, Paginated};
use crate::cache::{cache_key, CacheOptions, QueryParams};
use crate::resilience::ClassifiedError;
use crate::transport::Method;

const WRITE_TAGS: &[&str] = &[tags::CUSTOMERS, tags::BULK];

impl ApiClient {
    /// All customers, cached with background refresh.
    pub async fn customers(&self) -> Result<Vec<Customer>, ClassifiedError> {
        let key = cache_key(tags::CUSTOMERS, &QueryParams::new());
        let options = CacheOptions::new(self.ttls().customers_ttl())
            .tags([tags::CUSTOMERS])
            .background(true);
        self.cached("/customers", &key, &key, options).await
    }

    pub async fn customers_paginated(&self, query: &PageQuery) -> Result<Paginated<Customer>, ClassifiedError> {
        self.get(&QueryParams::from_serialize(query).apply_to("/customers/paginated"))
            .await
    }

    pub async fn create_customer(&self, customer: &Customer) -> Result<(), ClassifiedError> {
        self.mutate(Method::Post, "/customers", Some(encode(customer)?), WRITE_TAGS)
            .await
            .map(drop)
    }

    pub async fn update_customer(&self, customer: &Customer) -> Result<(), ClassifiedError> {
        let path = format!("/customers/{}", customer.id);
        self.mutate(Method::Put, &path, Some(encode(customer)?), WRITE_TAGS)
            .await
            .map(drop)
    }

    pub async fn delete_customer(&self, id: &str) -> Result<(), ClassifiedError> {
        self.mutate(Method::Delete, &format!("/customers/{}", id), None, WRITE_TAGS)
            .await
            .map(drop)
    }
}
