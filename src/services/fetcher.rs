//! Batched, retried and rate-guarded access to the remote platform.

use super::retry::RetryPolicy;
use crate::clients::{FetchError, VideoPlatform};
use crate::config::{ConcurrencyConfig, RetryConfig, YouTubeConfig};
use crate::domain::{VideoDetails, VideoId};
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Result of a details lookup over many ids.
///
/// `missing` names ids whose chunk failed after retries; `unavailable` names
/// ids the platform answered for but did not return (deleted or private).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailsBatch {
    pub videos: Vec<VideoDetails>,
    pub missing: Vec<VideoId>,
    pub unavailable: Vec<VideoId>,
}

impl DetailsBatch {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Read path used by the orchestrator. Implemented by [`RemoteFetcher`] and
/// by the caching decorator in front of it.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Up to `max_results` ranked candidate ids for a query.
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<VideoId>, FetchError>;

    /// Details for any number of ids, in input order.
    ///
    /// # Errors
    ///
    /// Only quota and rate-limit failures are returned as errors. Other chunk
    /// failures are reported through [`DetailsBatch::missing`].
    async fn fetch_details(&self, ids: &[VideoId]) -> Result<DetailsBatch, FetchError>;

    async fn transcript(&self, id: &VideoId) -> Result<String, FetchError>;
}

pub struct RemoteFetcher {
    platform: Arc<dyn VideoPlatform>,
    retry: RetryPolicy,
    batch_size: usize,
    request_timeout: Duration,
    permits: Arc<Semaphore>,
    parallel_chunks: usize,
}

impl RemoteFetcher {
    #[must_use]
    pub fn new(
        platform: Arc<dyn VideoPlatform>,
        youtube: &YouTubeConfig,
        retry: &RetryConfig,
        concurrency: &ConcurrencyConfig,
    ) -> Self {
        Self {
            platform,
            retry: RetryPolicy::from(retry),
            batch_size: youtube.batch_size.clamp(1, crate::config::MAX_BATCH_SIZE),
            request_timeout: youtube.request_timeout(),
            permits: Arc::new(Semaphore::new(concurrency.max_concurrent_fetches.max(1))),
            parallel_chunks: concurrency.max_concurrent_fetches.max(1),
        }
    }

    /// One attempt: waits for a global fetch slot, then runs `call` under the
    /// per-attempt timeout.
    async fn guarded<T, Fut>(&self, call: Fut) -> Result<T, FetchError>
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Transient("fetch pool closed".to_string()))?;

        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| FetchError::Timeout(self.request_timeout.as_secs()))?
    }

    async fn fetch_chunk(&self, chunk: &[VideoId]) -> Result<Vec<VideoDetails>, FetchError> {
        self.retry
            .execute("videos", |_| self.guarded(self.platform.video_details(chunk)))
            .await
    }
}

#[async_trait::async_trait]
impl Fetcher for RemoteFetcher {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<VideoId>, FetchError> {
        self.retry
            .execute("search", |_| self.guarded(self.platform.search(query, max_results)))
            .await
    }

    async fn fetch_details(&self, ids: &[VideoId]) -> Result<DetailsBatch, FetchError> {
        if ids.is_empty() {
            return Ok(DetailsBatch::default());
        }

        let chunks: Vec<&[VideoId]> = ids.chunks(self.batch_size).collect();
        debug!(
            event = "details_chunked",
            ids = ids.len(),
            chunks = chunks.len(),
            batch_size = self.batch_size
        );

        // `buffered` keeps chunk order while running up to `parallel_chunks` at once.
        let outcomes: Vec<(&[VideoId], Result<Vec<VideoDetails>, FetchError>)> =
            futures::stream::iter(
                chunks
                    .into_iter()
                    .map(|chunk| async move { (chunk, self.fetch_chunk(chunk).await) })
                    .collect::<Vec<_>>(),
            )
                .buffered(self.parallel_chunks)
                .collect()
                .await;

        let mut by_id: HashMap<VideoId, VideoDetails> = HashMap::new();
        let mut failed: Vec<VideoId> = Vec::new();

        for (chunk, outcome) in outcomes {
            match outcome {
                Ok(videos) => {
                    for video in videos {
                        by_id.insert(video.video_id.clone(), video);
                    }
                }
                Err(err @ (FetchError::QuotaExceeded(_) | FetchError::RateLimited(_))) => {
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        event = "details_chunk_failed",
                        ids = chunk.len(),
                        error = %err,
                        "Chunk dropped from result"
                    );
                    failed.extend(chunk.iter().cloned());
                }
            }
        }

        let mut batch = DetailsBatch::default();
        for id in ids {
            if let Some(video) = by_id.remove(id) {
                batch.videos.push(video);
            } else if failed.contains(id) {
                batch.missing.push(id.clone());
            } else {
                batch.unavailable.push(id.clone());
            }
        }

        Ok(batch)
    }

    async fn transcript(&self, id: &VideoId) -> Result<String, FetchError> {
        self.retry
            .execute("transcript", |_| self.guarded(self.platform.transcript(id)))
            .await
    }
}
