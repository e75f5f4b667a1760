//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::Value;

use crate::observability::metrics;
use crate::resilience::RawFailure;
use crate::transport::{Method, Transport, TransportRequest, TransportResponse};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP transport speaking JSON.
///
/// The overall per-attempt deadline is enforced by the caller; the client here
/// only bounds connection setup.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("rental-fetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_send_error(e: reqwest::Error) -> RawFailure {
    if e.is_timeout() {
        RawFailure::Timeout
    } else if e.is_connect() || e.is_request() {
        RawFailure::Network(e.to_string())
    } else {
        RawFailure::Unknown(e.to_string())
    }
}

/// Parse a response body. Empty bodies become `null`.
///
/// An unparseable body on a non-success status is dropped rather than
/// reported, so the status still drives classification.
fn parse_body(status: u16, bytes: &[u8]) -> Result<Value, RawFailure> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(_) if !(200..300).contains(&status) => Ok(Value::Null),
        Err(e) => Err(RawFailure::Decode(e.to_string())),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: TransportRequest) -> Result<TransportResponse, RawFailure> {
        let mut builder = self
            .client
            .request(to_reqwest(request.method), request.url.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(REQUEST_ID_HEADER, request.request_id.to_string());

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status().as_u16();
        metrics::record_request(request.method.as_str(), status);

        let bytes = response.bytes().await.map_err(map_send_error)?;
        let body = parse_body(status, &bytes)?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status,
            request_id = %request.request_id,
            attempt = request.attempt,
            "Transport response"
        );

        Ok(TransportResponse::new(status, body))
    }
}
