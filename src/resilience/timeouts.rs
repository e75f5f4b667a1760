//! Timeout enforcement.
//!
//! Every transport call gets a deadline. An elapsed deadline surfaces as
//! `RawFailure::Timeout`, which classifies as a retryable network failure.

use std::future::Future;
use std::time::Duration;

use crate::resilience::classifier::RawFailure;

/// Run `fut` with a deadline.
pub async fn with_timeout<T, F>(deadline: Duration, fut: F) -> Result<T, RawFailure>
where
    F: Future<Output = Result<T, RawFailure>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(deadline = ?deadline, "Transport deadline elapsed");
            Err(RawFailure::Timeout)
        }
    }
}
