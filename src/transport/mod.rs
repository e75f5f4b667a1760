//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! ApiClient
//!     → credentials.rs (bearer token, consulted per request)
//!     → Transport::request (http.rs: reqwest, per-attempt deadline)
//!     → status + JSON body
//!     → envelope.rs ({success, data} unwrapping)
//! ```
//!
//! # Design Decisions
//! - The client only needs a status code, a parseable body, and a bearer header
//! - `Transport` is a trait so tests can script responses without a socket
//! - Non-success statuses are not errors here; the client decides

pub mod credentials;
pub mod envelope;
pub mod http;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::resilience::RawFailure;

pub use credentials::{CredentialProvider, EnvToken, NoCredentials, StaticToken, TokenStore};
pub use envelope::{extract_records, unwrap_envelope};
pub use http::HttpTransport;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outbound request.
#[derive(Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
    pub bearer: Option<String>,
    /// Correlation ID, identical across retries of one call.
    pub request_id: Uuid,
    /// 1 for the first try, incremented on every retry.
    pub attempt: u32,
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("has_body", &self.body.is_some())
            .field("has_token", &self.bearer.is_some())
            .field("request_id", &self.request_id)
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Status and parsed body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests and yields a status code plus structured body.
///
/// Only failures to obtain a response at all (timeouts, connection errors,
/// unparseable bodies) are reported as `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, RawFailure>;
}
