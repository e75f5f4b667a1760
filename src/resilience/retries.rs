//! Retry logic.
//!
//! # Responsibilities
//! - Run a fallible operation, retrying classified-retryable failures
//! - Sleep with exponential backoff between attempts
//! - Stop after `max_retries` retries or on the first terminal failure
//!
//! Authentication failures are never retried, whatever `retry_condition` says.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::classifier::ClassifiedError;

/// Predicate deciding whether a classified failure should be retried.
pub type RetryCondition = Arc<dyn Fn(&ClassifiedError) -> bool + Send + Sync>;

/// Per-call retry settings.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
    pub retry_condition: RetryCondition,
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    pub fn with_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ClassifiedError) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Arc::new(condition);
        self
    }

    /// Whether a failure after `retries_done` retries should be retried.
    pub fn should_retry(&self, error: &ClassifiedError, retries_done: u32) -> bool {
        if error.is_auth() || retries_done >= self.max_retries {
            return false;
        }
        (self.retry_condition)(error)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        calculate_backoff(retry, self.base_delay, self.max_delay, self.jitter_ratio)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(8000),
            jitter_ratio: 0.0,
            retry_condition: Arc::new(ClassifiedError::is_retryable),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::default()
            .with_max_retries(config.max_retries)
            .with_delays(
                Duration::from_millis(config.base_delay_ms),
                Duration::from_millis(config.max_delay_ms),
            )
            .with_jitter(config.jitter_ratio)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter_ratio", &self.jitter_ratio)
            .finish()
    }
}

/// Execute `operation`, retrying per `policy`.
///
/// Errors are classified once, on the way out of `operation`; an operation
/// that already returns `ClassifiedError` is passed through as is.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, ClassifiedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<ClassifiedError>,
{
    let mut retries_done = 0;

    loop {
        let error: ClassifiedError = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e.into(),
        };

        if !policy.should_retry(&error, retries_done) {
            if retries_done > 0 {
                tracing::warn!(
                    retries = retries_done,
                    kind = %error.kind,
                    status = ?error.status,
                    "Giving up after retries"
                );
            }
            return Err(error);
        }

        let delay = policy.delay_for(retries_done);
        retries_done += 1;
        metrics::record_retry(error.kind.as_str());
        tracing::info!(
            attempt = retries_done,
            delay = ?delay,
            kind = %error.kind,
            status = ?error.status,
            "Retrying request"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::classifier::{ErrorKind, RawFailure};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn server_error() -> RawFailure {
        RawFailure::Status { status: 503, body: None }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(server_error())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_is_bounded() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let started = Instant::now();

        let result: Result<(), _> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RawFailure::Timeout) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(calls.load(Ordering::SeqCst), policy.max_retries + 1);
        // 1s + 2s + 4s
        assert_eq!(started.elapsed(), Duration::from_secs(7));
        assert!(started.elapsed() <= policy.max_delay * policy.max_retries);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_never_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_condition(|_| true);

        let result: Result<(), _> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RawFailure::Status { status: 401, body: None }) }
        })
        .await;

        assert!(result.unwrap_err().is_auth());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), _> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RawFailure::Status { status: 400, body: None }) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Client);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_condition_can_veto() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_condition(|e| e.kind != ErrorKind::Server);

        let result: Result<(), _> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(server_error()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classified_errors_pass_through_unchanged() {
        let original = ClassifiedError::from(RawFailure::Status { status: 500, body: None });
        let policy = RetryPolicy::none();
        let expected = original.clone();

        let result: Result<(), ClassifiedError> = with_retry(&policy, || {
            let e = original.clone();
            async move { Err(e) }
        })
        .await;

        let err = result.unwrap_err();
        assert!(Arc::ptr_eq(&err.cause, &expected.cause));
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 200,
            max_delay_ms: 1000,
            jitter_ratio: 0.0,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(1000));
    }
}
