//! In-flight request registry.
//!
//! # Responsibilities
//! - Start at most one operation per key at any time
//! - Hand every concurrent caller for that key the same outcome
//! - Forget the key the moment the operation settles
//!
//! # Design Decisions
//! - Lookup and registration happen under one lock, with no await between them
//! - The registry holds only a weak handle; if every caller abandons the
//!   request the operation is dropped and the next caller starts afresh
//! - The registration is cleared inside the shared future, before any waiter
//!   observes the result

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};

use crate::observability::metrics;
use crate::resilience::ClassifiedError;

type Outcome<T> = BoxFuture<'static, Result<T, ClassifiedError>>;

struct Slot<T> {
    generation: u64,
    handle: WeakShared<Outcome<T>>,
}

type Registry<T> = Arc<Mutex<HashMap<String, Slot<T>>>>;

/// Collapses concurrent calls sharing a key onto one operation.
pub struct RequestDeduplicator<T> {
    inflight: Registry<T>,
    next_generation: AtomicU64,
}

impl<T> RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Run `operation` for `key`, or join the one already running.
    pub async fn deduplicate<F, Fut>(&self, key: &str, operation: F) -> Result<T, ClassifiedError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ClassifiedError>> + Send + 'static,
    {
        let shared = self.attach_or_start(key, operation);
        shared.await
    }

    fn attach_or_start<F, Fut>(&self, key: &str, operation: F) -> Shared<Outcome<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ClassifiedError>> + Send + 'static,
    {
        let mut inflight = lock(&self.inflight);

        if let Some(existing) = inflight.get(key).and_then(|slot| slot.handle.upgrade()) {
            metrics::record_dedup_join();
            tracing::debug!(key = %key, "Joining in-flight request");
            return existing;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.inflight);
        let owned_key = key.to_string();

        let outcome: Outcome<T> = async move {
            let result = operation().await;
            release(&registry, &owned_key, generation);
            result
        }
        .boxed();

        let shared = outcome.shared();
        if let Some(handle) = shared.downgrade() {
            inflight.insert(key.to_string(), Slot { generation, handle });
        }
        shared
    }

    /// Number of keys with a live in-flight operation.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.inflight)
            .values()
            .filter(|slot| slot.handle.upgrade().is_some())
            .count()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        lock(&self.inflight)
            .get(key)
            .is_some_and(|slot| slot.handle.upgrade().is_some())
    }
}

impl<T> Default for RequestDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(registry: &Registry<T>) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Remove `key` if it is still registered to `generation`.
fn release<T>(registry: &Registry<T>, key: &str, generation: u64) {
    let mut inflight = lock(registry);
    if inflight.get(key).is_some_and(|slot| slot.generation == generation) {
        inflight.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::RawFailure;
    use futures_util::future::join_all;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn slow_op(
        calls: &Arc<AtomicU32>,
        result: Result<u32, ClassifiedError>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, ClassifiedError>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                result
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_execution() {
        let dedup = RequestDeduplicator::new();
        let calls = Arc::new(AtomicU32::new(0));

        let results = join_all((0..10).map(|_| dedup.deduplicate("bulk-data", slow_op(&calls, Ok(42))))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| matches!(r, Ok(42))));
        assert_eq!(dedup.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_cleared() {
        let dedup = RequestDeduplicator::new();
        let calls = Arc::new(AtomicU32::new(0));
        let failure = ClassifiedError::from(RawFailure::Status { status: 500, body: None });

        let results = join_all((0..3).map(|_| dedup.deduplicate("k", slow_op(&calls, Err(failure.clone()))))).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in &results {
            let err = result.as_ref().unwrap_err();
            assert!(Arc::ptr_eq(&err.cause, &failure.cause));
        }

        // A later call starts a fresh operation.
        let later = dedup.deduplicate("k", slow_op(&calls, Ok(1))).await;
        assert_eq!(later.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_keys_run_independently() {
        let dedup = RequestDeduplicator::new();
        let calls = Arc::new(AtomicU32::new(0));

        let (a, b) = tokio::join!(
            dedup.deduplicate("vehicles", slow_op(&calls, Ok(1))),
            dedup.deduplicate("companies", slow_op(&calls, Ok(2))),
        );

        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_request_does_not_block_later_callers() {
        let dedup = Arc::new(RequestDeduplicator::new());
        let calls = Arc::new(AtomicU32::new(0));

        let abandoned = {
            let dedup = Arc::clone(&dedup);
            let op = slow_op(&calls, Ok(1));
            tokio::spawn(async move { dedup.deduplicate("k", op).await })
        };
        tokio::task::yield_now().await;
        assert!(dedup.is_in_flight("k"));
        abandoned.abort();
        let _ = abandoned.await;

        assert!(!dedup.is_in_flight("k"));
        let result = dedup.deduplicate("k", slow_op(&calls, Ok(2))).await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
