//! Company accessors. Companies change rarely, hence the long TTL.

use crate::api::client::{encode, ApiClient};
use crate::api::tags;
use crate::api::types::{Company, PageQuery, Paginated};
use crate::cache::{cache_key, CacheOptions, QueryParams};
use crate::resilience::ClassifiedError;
use crate::transport::Method;

const WRITE_TAGS: &[&str] = &[tags::COMPANIES, tags::BULK];

impl ApiClient {
    pub async fn companies(&self) -> Result<Vec<Company>, ClassifiedError> {
        let key = cache_key(tags::COMPANIES, &QueryParams::new());
        let options = CacheOptions::new(self.ttls().companies_ttl())
            .tags([tags::COMPANIES])
            .background(true);
        self.cached("/companies", &key, &key, options).await
    }

    pub async fn companies_paginated(&self, query: &PageQuery) -> Result<Paginated<Company>, ClassifiedError> {
        self.get(&QueryParams::from_serialize(query).apply_to("/companies/paginated"))
            .await
    }

    pub async fn create_company(&self, company: &Company) -> Result<(), ClassifiedError> {
        self.mutate(Method::Post, "/companies", Some(encode(company)?), WRITE_TAGS)
            .await
            .map(drop)
    }

    pub async fn delete_company(&self, id: &str) -> Result<(), ClassifiedError> {
        self.mutate(Method::Delete, &format!("/companies/{}", id), None, WRITE_TAGS)
            .await
            .map(drop)
    }
}
