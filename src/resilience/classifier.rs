//! Failure classification.
//!
//! Turns a raw transport outcome into a verdict the rest of the crate can act
//! on: retry it, or hand a display-ready message back to the caller.
//!
//! # Priority
//! ```text
//! 401 / 403                  → Authentication (terminal)
//! 5xx, timeout, network      → Server / Network (retryable)
//! other 4xx                  → Client (terminal, message from payload)
//! anything else              → Unknown (terminal)
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// A failure exactly as observed at the transport boundary.
#[derive(Debug, Error)]
pub enum RawFailure {
    /// The server answered with a non-success status.
    #[error("HTTP status {status}")]
    Status { status: u16, body: Option<Value> },

    /// The request did not complete within the transport deadline.
    #[error("request timed out")]
    Timeout,

    /// Connection could not be established or was dropped.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be parsed.
    #[error("decode error: {0}")]
    Decode(String),

    /// The response parsed but had an unexpected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Anything the transport could not describe more precisely.
    #[error("unknown failure: {0}")]
    Unknown(String),
}

/// Failure category, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Server,
    Network,
    Client,
    Unknown,
}

impl ErrorKind {
    /// Stable label used for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Server => "server",
            ErrorKind::Network => "network",
            ErrorKind::Client => "client",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const AUTH_MESSAGE: &str = "Your session has expired or you lack permission. Please sign in again.";
pub const SERVER_MESSAGE: &str = "The server is temporarily unavailable. Please try again shortly.";
pub const NETWORK_MESSAGE: &str = "Unable to reach the server. Check your connection and try again.";
pub const CLIENT_MESSAGE: &str = "The request was rejected by the server.";
pub const UNKNOWN_MESSAGE: &str = "An unexpected error occurred.";

/// A classified, display-ready failure.
///
/// Cloneable so one outcome can be handed to every caller waiting on the same
/// in-flight request.
#[derive(Debug, Clone, Error)]
#[error("{user_message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub retryable: bool,
    pub user_message: String,
    pub status: Option<u16>,
    #[source]
    pub cause: Arc<RawFailure>,
}

impl ClassifiedError {
    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<RawFailure> for ClassifiedError {
    fn from(raw: RawFailure) -> Self {
        classify_owned(Arc::new(raw))
    }
}

/// Classify a raw failure. Pure: the same input always yields the same verdict.
pub fn classify(raw: &Arc<RawFailure>) -> ClassifiedError {
    classify_owned(Arc::clone(raw))
}

fn classify_owned(raw: Arc<RawFailure>) -> ClassifiedError {
    let (kind, status, user_message) = match raw.as_ref() {
        RawFailure::Status { status, .. } if matches!(status, 401 | 403) => {
            (ErrorKind::Authentication, Some(*status), AUTH_MESSAGE.to_string())
        }
        RawFailure::Status { status, .. } if (500..600).contains(status) => {
            (ErrorKind::Server, Some(*status), SERVER_MESSAGE.to_string())
        }
        RawFailure::Timeout | RawFailure::Network(_) => {
            (ErrorKind::Network, None, NETWORK_MESSAGE.to_string())
        }
        RawFailure::Status { status, body } if (400..500).contains(status) => {
            let message = body
                .as_ref()
                .and_then(payload_message)
                .unwrap_or_else(|| CLIENT_MESSAGE.to_string());
            (ErrorKind::Client, Some(*status), message)
        }
        RawFailure::Status { status, .. } => {
            (ErrorKind::Unknown, Some(*status), UNKNOWN_MESSAGE.to_string())
        }
        RawFailure::Decode(_) | RawFailure::InvalidResponse(_) | RawFailure::Unknown(_) => {
            (ErrorKind::Unknown, None, UNKNOWN_MESSAGE.to_string())
        }
    };

    ClassifiedError {
        retryable: matches!(kind, ErrorKind::Server | ErrorKind::Network),
        kind,
        user_message,
        status,
        cause: raw,
    }
}

/// Pull a human message out of an error payload (`error` first, then `message`).
fn payload_message(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|field| body.get(*field))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
