//! Rental accessors.
//!
//! Rentals change often and are never cached on their own; they reach the
//! cache only as part of the bulk aggregate.

use crate::api::client::{decode, encode, ApiClient};
use crate::api::tags;
use crate::api::types::{PageQuery, Paginated, Rental};
use crate::cache::QueryParams;
use crate::resilience::ClassifiedError;
use crate::transport::Method;

const WRITE_TAGS: &[&str] = &[tags::RENTALS, tags::BULK];

impl ApiClient {
    pub async fn rentals(&self) -> Result<Vec<Rental>, ClassifiedError> {
        self.get("/rentals").await
    }

    pub async fn rental(&self, id: &str) -> Result<Rental, ClassifiedError> {
        self.get(&format!("/rentals/{}", id)).await
    }

    pub async fn rentals_paginated(&self, query: &PageQuery) -> Result<Paginated<Rental>, ClassifiedError> {
        self.get(&QueryParams::from_serialize(query).apply_to("/rentals/paginated"))
            .await
    }

    /// Create a rental and return it as stored by the backend.
    pub async fn create_rental(&self, rental: &Rental) -> Result<Rental, ClassifiedError> {
        let created = self
            .mutate(Method::Post, "/rentals", Some(encode(rental)?), WRITE_TAGS)
            .await?;
        decode(created)
    }

    pub async fn update_rental(&self, rental: &Rental) -> Result<(), ClassifiedError> {
        let path = format!("/rentals/{}", rental.id);
        self.mutate(Method::Put, &path, Some(encode(rental)?), WRITE_TAGS)
            .await
            .map(drop)
    }

    pub async fn delete_rental(&self, id: &str) -> Result<(), ClassifiedError> {
        self.mutate(Method::Delete, &format!("/rentals/{}", id), None, WRITE_TAGS)
            .await
            .map(drop)
    }
}
