//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Transport call:
//!     → timeouts.rs (deadline per attempt)
//!     → classifier.rs (raw failure → ClassifiedError, exactly once)
//!     → retries.rs (retry retryable failures with backoff.rs delays)
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function shared by the retry loop and callers
//! - Authentication failures are terminal; a stale credential is not fixed by retrying
//! - Retry count is bounded, so worst-case latency is the sum of the backoff delays

pub mod backoff;
pub mod classifier;
pub mod retries;
pub mod timeouts;

pub use classifier::{classify, ClassifiedError, ErrorKind, RawFailure};
pub use retries::{with_retry, RetryPolicy};
