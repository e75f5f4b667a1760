//! Fetch orchestrator core.
//!
//! Every call goes through one path:
//! credentials → retry loop → per-attempt deadline → transport → status check
//! → envelope unwrap. Cached accessors put the cache store and the
//! deduplicator in front of that path.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::api::types::ProtocolStatus;
use crate::cache::{CacheOptions, CacheStats, CacheStore, DurableCache, FileDurableCache};
use crate::config::{CacheConfig, ClientConfig};
use crate::dedup::RequestDeduplicator;
use crate::resilience::timeouts::with_timeout;
use crate::resilience::{with_retry, ClassifiedError, RawFailure, RetryPolicy};
use crate::transport::{
    unwrap_envelope, CredentialProvider, EnvToken, HttpTransport, Method, Transport, TransportRequest,
};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid base URL {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to build HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}

pub(crate) struct Inner {
    pub(crate) base_url: Url,
    pub(crate) request_timeout: Duration,
    pub(crate) retry: RetryPolicy,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) credentials: Arc<dyn CredentialProvider>,
    pub(crate) cache: Arc<CacheStore<Value>>,
    pub(crate) dedup: RequestDeduplicator<Value>,
    pub(crate) ttls: CacheConfig,
    pub(crate) protocol_cache: Option<Arc<dyn DurableCache<ProtocolStatus>>>,
    pub(crate) protocol_dedup: RequestDeduplicator<Vec<ProtocolStatus>>,
    pub(crate) protocol_refreshing: AtomicBool,
}

/// Client for the rental backend. Cheap to clone; clones share caches.
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) inner: Arc<Inner>,
}

/// Assembles an [`ApiClient`] from config and injected collaborators.
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    protocol_cache: Option<Arc<dyn DurableCache<ProtocolStatus>>>,
    retry: Option<RetryPolicy>,
}

impl ApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            credentials: None,
            protocol_cache: None,
            retry: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn protocol_cache(mut self, cache: Arc<dyn DurableCache<ProtocolStatus>>) -> Self {
        self.protocol_cache = Some(cache);
        self
    }

    /// Override the retry policy derived from `[retry]`.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn build(self) -> Result<ApiClient, BuildError> {
        let config = self.config;
        let base_url = Url::parse(&config.api.base_url).map_err(|source| BuildError::InvalidBaseUrl {
            url: config.api.base_url.clone(),
            source,
        })?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(config.api.request_timeout())?),
        };
        let credentials: Arc<dyn CredentialProvider> = match self.credentials {
            Some(credentials) => credentials,
            None => Arc::new(EnvToken::new(&config.api.token_env)),
        };

        let protocol_cache = self.protocol_cache.or_else(|| {
            let settings = &config.protocol_cache;
            settings.enabled.then(|| {
                Arc::new(FileDurableCache::<ProtocolStatus>::open(&settings.path, settings.max_age()))
                    as Arc<dyn DurableCache<ProtocolStatus>>
            })
        });

        let retry = self.retry.unwrap_or_else(|| RetryPolicy::from(&config.retry));

        tracing::info!(
            base_url = %base_url,
            max_retries = retry.max_retries,
            protocol_cache = protocol_cache.is_some(),
            "API client ready"
        );

        Ok(ApiClient {
            inner: Arc::new(Inner {
                base_url,
                request_timeout: config.api.request_timeout(),
                retry,
                transport,
                credentials,
                cache: Arc::new(CacheStore::new(config.cache.refresh_after_ratio)),
                dedup: RequestDeduplicator::new(),
                ttls: config.cache,
                protocol_cache,
                protocol_dedup: RequestDeduplicator::new(),
                protocol_refreshing: AtomicBool::new(false),
            }),
        })
    }
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    // ---- generic verbs ----

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClassifiedError> {
        decode(self.get_value(path).await?)
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClassifiedError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        decode(self.post_value(path, encode(body)?).await?)
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClassifiedError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        decode(self.put_value(path, encode(body)?).await?)
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClassifiedError> {
        decode(self.delete_value(path).await?)
    }

    pub async fn get_value(&self, path: &str) -> Result<Value, ClassifiedError> {
        self.execute(Method::Get, path, None).await
    }

    pub async fn post_value(&self, path: &str, body: Value) -> Result<Value, ClassifiedError> {
        self.execute(Method::Post, path, Some(body)).await
    }

    pub async fn put_value(&self, path: &str, body: Value) -> Result<Value, ClassifiedError> {
        self.execute(Method::Put, path, Some(body)).await
    }

    pub async fn delete_value(&self, path: &str) -> Result<Value, ClassifiedError> {
        self.execute(Method::Delete, path, None).await
    }

    // ---- invalidation hooks ----

    /// Drop every cached entry tagged `tag`. Hook for the push channel.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.inner.cache.invalidate_tag(tag)
    }

    pub fn invalidate_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.cache.invalidate_tags(tags)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Number of deduplicated requests currently on the wire.
    pub fn in_flight_count(&self) -> usize {
        self.inner.dedup.in_flight_count() + self.inner.protocol_dedup.in_flight_count()
    }

    // ---- internals ----

    /// Send one logical call, retrying per policy.
    async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ClassifiedError> {
        let inner = &*self.inner;
        let url = self.url_for(path)?;
        let request_id = Uuid::new_v4();
        let mut attempt = 0;

        let result = with_retry(&inner.retry, || {
            attempt += 1;
            let request = TransportRequest {
                method,
                url: url.clone(),
                body: body.clone(),
                bearer: inner.credentials.token(),
                request_id,
                attempt,
            };
            tracing::debug!(
                request_id = %request_id,
                method = %method,
                url = %url,
                attempt,
                "Sending request"
            );
            async move {
                let response = with_timeout(inner.request_timeout, inner.transport.request(request)).await?;
                if response.is_success() {
                    Ok(unwrap_envelope(response.body))
                } else {
                    Err(RawFailure::Status {
                        status: response.status,
                        body: Some(response.body).filter(|b| !b.is_null()),
                    })
                }
            }
        })
        .await;

        if let Err(e) = &result {
            tracing::warn!(
                method = %method,
                path = %path,
                request_id = %request_id,
                kind = %e.kind,
                status = ?e.status,
                "Request failed"
            );
        }
        result
    }

    fn url_for(&self, path: &str) -> Result<Url, ClassifiedError> {
        let joined = format!(
            "{}/{}",
            self.inner.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| RawFailure::Unknown(format!("invalid request URL {}: {}", joined, e)).into())
    }

    /// Read through the cache store, collapsing concurrent misses on `dedup_key`.
    ///
    /// Only fetches that saw the same invalidations are collapsed: the
    /// deduplication key carries the store's epochs for `cache_key` and its
    /// tags, read when the producer starts.
    pub(crate) async fn cached<T: DeserializeOwned>(
        &self,
        path: &str,
        cache_key: &str,
        dedup_key: &str,
        options: CacheOptions,
    ) -> Result<T, ClassifiedError> {
        let client = self.clone();
        let path = path.to_string();
        let dedup_key = dedup_key.to_string();
        let entry_key = cache_key.to_string();
        let tags = options.tags.clone();

        let producer = move || {
            let epochs = client.inner.cache.epoch_snapshot(&entry_key, &tags);
            let dedup_key = format!("{}@{}", dedup_key, epochs);
            async move {
                let fetcher = client.clone();
                client
                    .inner
                    .dedup
                    .deduplicate(&dedup_key, move || async move { fetcher.get_value(&path).await })
                    .await
            }
        };

        let value = self.inner.cache.get_or_fetch(cache_key, producer, options).await?;
        decode(value)
    }

    /// Run a write, invalidating `tags` only once it has succeeded.
    pub(crate) async fn mutate(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        tags: &[&str],
    ) -> Result<Value, ClassifiedError> {
        let value = self.execute(method, path, body).await?;
        let removed = self.invalidate_tags(tags.iter().copied());
        tracing::debug!(method = %method, path = %path, removed, "Invalidated after write");
        Ok(value)
    }

    pub(crate) fn ttls(&self) -> &CacheConfig {
        &self.inner.ttls
    }
}

/// Decode a successful payload; a shape mismatch is an unknown failure.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClassifiedError> {
    serde_json::from_value(value).map_err(|e| RawFailure::Decode(e.to_string()).into())
}

pub(crate) fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ClassifiedError> {
    serde_json::to_value(body).map_err(|e| RawFailure::Unknown(format!("unserializable request body: {}", e)).into())
}
