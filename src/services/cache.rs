//! In-memory TTL cache in front of the remote fetcher.
//!
//! Each namespace (`search:`, `details:`, `transcript:`) is its own bounded
//! `moka` cache with the namespace TTL. Concurrent misses on the same key
//! share one initialization, and [`ResponseCache::sweep`] runs the pending
//! housekeeping so expired entries are actually released.

use super::fetcher::{DetailsBatch, Fetcher};
use crate::clients::FetchError;
use crate::config::CacheConfig;
use crate::domain::VideoId;
use moka::future::Cache;
use moka::notification::RemovalCause;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Search,
    Details,
    Transcript,
}

impl Namespace {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Details => "details",
            Self::Transcript => "transcript",
        }
    }

    #[must_use]
    pub fn key(self, argument: &str) -> String {
        format!("{}:{argument}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachePayload {
    SearchIds(Vec<VideoId>),
    Details(DetailsBatch),
    Transcript(String),
}

impl CachePayload {
    /// Partial detail batches are served once but never stored.
    fn is_cacheable(&self) -> bool {
        !matches!(self, Self::Details(batch) if batch.is_partial())
    }
}

/// Why an initialization produced nothing to store. Shared between every
/// caller that was waiting on the same key.
#[derive(Debug, Clone)]
enum Uncached {
    Partial(CachePayload),
    Failed(FetchError),
}

type NamespaceCache = Cache<String, CachePayload>;

#[derive(Clone)]
pub struct ResponseCache {
    search: Option<NamespaceCache>,
    details: Option<NamespaceCache>,
    transcript: Option<NamespaceCache>,
    expired: Arc<AtomicU64>,
    reported: Arc<AtomicU64>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::from_ttls(
            Duration::from_secs(config.search_ttl_seconds),
            Duration::from_secs(config.details_ttl_seconds),
            Duration::from_secs(config.transcript_ttl_seconds),
            config.max_entries,
        )
    }

    /// A zero TTL disables caching for that namespace.
    #[must_use]
    pub fn from_ttls(
        search: Duration,
        details: Duration,
        transcript: Duration,
        max_entries: u64,
    ) -> Self {
        let expired = Arc::new(AtomicU64::new(0));
        let build = |ttl: Duration| -> Option<NamespaceCache> {
            if ttl.is_zero() {
                return None;
            }
            let expired = expired.clone();
            Some(
                NamespaceCache::builder()
                    .max_capacity(max_entries)
                    .time_to_live(ttl)
                    .eviction_listener(move |_key, _value, cause| {
                        if matches!(cause, RemovalCause::Expired) {
                            expired.fetch_add(1, Ordering::Relaxed);
                        }
                    })
                    .build(),
            )
        };

        let search = build(search);
        let details = build(details);
        let transcript = build(transcript);

        Self {
            search,
            details,
            transcript,
            expired,
            reported: Arc::new(AtomicU64::new(0)),
        }
    }

    fn store(&self, namespace: Namespace) -> Option<&NamespaceCache> {
        match namespace {
            Namespace::Search => self.search.as_ref(),
            Namespace::Details => self.details.as_ref(),
            Namespace::Transcript => self.transcript.as_ref(),
        }
    }

    fn stores(&self) -> impl Iterator<Item = &NamespaceCache> {
        [&self.search, &self.details, &self.transcript]
            .into_iter()
            .flatten()
    }

    /// Live entry for `argument`, if any.
    pub async fn get(&self, namespace: Namespace, argument: &str) -> Option<CachePayload> {
        self.store(namespace)?.get(&namespace.key(argument)).await
    }

    pub async fn put(&self, namespace: Namespace, argument: &str, payload: CachePayload) {
        if let Some(store) = self.store(namespace) {
            store.insert(namespace.key(argument), payload).await;
        }
    }

    /// Releases expired entries and returns how many expired since the
    /// previous sweep.
    pub async fn sweep(&self) -> u64 {
        for store in self.stores() {
            store.run_pending_tasks().await;
        }
        let total = self.expired.load(Ordering::Relaxed);
        total.saturating_sub(self.reported.swap(total, Ordering::Relaxed))
    }

    pub async fn len(&self) -> u64 {
        let mut total = 0;
        for store in self.stores() {
            store.run_pending_tasks().await;
            total += store.entry_count();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Read-through lookup with at most one outstanding `fetch` per key.
    ///
    /// Callers that arrive while a fetch is running wait for it. If the
    /// caller driving the fetch goes away, the fetch is dropped with it and
    /// the next waiter starts over.
    pub async fn get_or_fetch<Fut>(
        &self,
        namespace: Namespace,
        argument: &str,
        fetch: Fut,
    ) -> Result<CachePayload, FetchError>
    where
        Fut: Future<Output = Result<CachePayload, FetchError>>,
    {
        let label = namespace.as_str();
        let Some(store) = self.store(namespace) else {
            metrics::counter!("cache_requests_total", "namespace" => label, "outcome" => "bypass")
                .increment(1);
            return fetch.await;
        };
        let key = namespace.key(argument);

        if let Some(payload) = store.get(&key).await {
            metrics::counter!("cache_requests_total", "namespace" => label, "outcome" => "hit")
                .increment(1);
            debug!(event = "cache_hit", key = %key);
            return Ok(payload);
        }

        let init = async {
            match fetch.await {
                Ok(payload) if payload.is_cacheable() => Ok(payload),
                Ok(payload) => Err(Uncached::Partial(payload)),
                Err(err) => Err(Uncached::Failed(err)),
            }
        };

        match store.entry(key.clone()).or_try_insert_with(init).await {
            Ok(entry) => {
                let outcome = if entry.is_fresh() { "miss" } else { "coalesced" };
                metrics::counter!("cache_requests_total", "namespace" => label, "outcome" => outcome)
                    .increment(1);
                debug!(event = "cache_filled", key = %key, outcome);
                Ok(entry.into_value())
            }
            Err(shared) => match Arc::unwrap_or_clone(shared) {
                Uncached::Partial(payload) => {
                    debug!(event = "cache_skipped_partial", key = %key);
                    Ok(payload)
                }
                Uncached::Failed(err) => Err(err),
            },
        }
    }
}

/// Read-through caching decorator for any [`Fetcher`].
pub struct CachedFetcher {
    inner: Arc<dyn Fetcher>,
    cache: ResponseCache,
}

impl CachedFetcher {
    #[must_use]
    pub fn new(inner: Arc<dyn Fetcher>, cache: ResponseCache) -> Self {
        Self { inner, cache }
    }
}

/// Cache argument for a query: trimmed, lower-cased, single-spaced.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn unexpected(namespace: Namespace) -> FetchError {
    FetchError::Decode(format!("cache held a foreign payload under {}", namespace.as_str()))
}

#[async_trait::async_trait]
impl Fetcher for CachedFetcher {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<VideoId>, FetchError> {
        let argument = format!("{max_results}:{}", normalize_query(query));
        let payload = self
            .cache
            .get_or_fetch(Namespace::Search, &argument, async {
                self.inner
                    .search(query, max_results)
                    .await
                    .map(CachePayload::SearchIds)
            })
            .await?;

        match payload {
            CachePayload::SearchIds(ids) => Ok(ids),
            _ => Err(unexpected(Namespace::Search)),
        }
    }

    async fn fetch_details(&self, ids: &[VideoId]) -> Result<DetailsBatch, FetchError> {
        if ids.is_empty() {
            return Ok(DetailsBatch::default());
        }

        let argument = ids.iter().map(VideoId::as_str).collect::<Vec<_>>().join(",");
        let payload = self
            .cache
            .get_or_fetch(Namespace::Details, &argument, async {
                self.inner.fetch_details(ids).await.map(CachePayload::Details)
            })
            .await?;

        match payload {
            CachePayload::Details(batch) => Ok(batch),
            _ => Err(unexpected(Namespace::Details)),
        }
    }

    async fn transcript(&self, id: &VideoId) -> Result<String, FetchError> {
        let payload = self
            .cache
            .get_or_fetch(Namespace::Transcript, id.as_str(), async {
                self.inner.transcript(id).await.map(CachePayload::Transcript)
            })
            .await?;

        match payload {
            CachePayload::Transcript(text) => Ok(text),
            _ => Err(unexpected(Namespace::Transcript)),
        }
    }
}
