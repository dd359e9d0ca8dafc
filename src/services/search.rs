//! Query orchestration: cache, store, remote fetch, summarization and
//! persistence, exposed as a batch call and as a progressive stream.
//!
//! Both protocols share the same stages:
//!
//! ```text
//! CacheCheck -> Fetching -> [PartialFailure] -> Summarizing -> Persisting -> Emit -> Recording -> Done
//! ```
//!
//! Stored videos younger than the refresh window skip `Fetching` entirely.
//! The batch protocol reorders results to the search ranking before
//! returning; the stream emits each video as soon as it is ready.

use super::fetcher::Fetcher;
use super::history::HistoryExporter;
use super::summarizer::{
    EMPTY_SUMMARY, Summarizer, Summary, TopicLabeler, extract_topics, summarize_document,
};
use crate::clients::FetchError;
use crate::config::{Config, MAX_SEARCH_RESULTS};
use crate::db::{StoreError, VideoStore};
use crate::domain::{SearchId, VideoDetails, VideoId, VideoRecord};
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};

const MAX_QUERY_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0}")]
    Validation(String),

    #[error("YouTube API quota exceeded. Please try again later.")]
    QuotaExceeded,

    #[error("Too many requests to YouTube. Please slow down and retry shortly.")]
    RateLimited,

    #[error("Video service unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<FetchError> for SearchError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::QuotaExceeded(_) => Self::QuotaExceeded,
            FetchError::RateLimited(_) => Self::RateLimited,
            other => Self::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    CacheCheck,
    Fetching,
    PartialFailure,
    Summarizing,
    Persisting,
    Emit,
    Recording,
    Done,
}

impl SearchStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CacheCheck => "cache_check",
            Self::Fetching => "fetching",
            Self::PartialFailure => "partial_failure",
            Self::Summarizing => "summarizing",
            Self::Persisting => "persisting",
            Self::Emit => "emit",
            Self::Recording => "recording",
            Self::Done => "done",
        }
    }
}

/// Final result of the batch protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub results: Vec<VideoRecord>,
    /// Ids whose details could not be fetched after retries.
    pub missing_ids: Vec<VideoId>,
    /// `None` when recording the search failed.
    pub search_id: Option<SearchId>,
    /// True when the remote API was unreachable and results came from the store.
    pub offline: bool,
}

/// Terminal line of a stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamEnd {
    pub done: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_ids: Vec<VideoId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_id: Option<SearchId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the remote API was unreachable and results came from the store.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub offline: bool,
}

/// One line of the stream protocol.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamItem {
    Video(Box<VideoRecord>),
    Done(StreamEnd),
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub refresh_after: chrono::Duration,
    pub max_topics: usize,
    pub stream_buffer: usize,
    pub max_concurrent_summaries: usize,
    pub worker_limit: usize,
    /// Result count when the caller does not ask for one.
    pub max_results: u32,
}

impl From<&Config> for SearchSettings {
    fn from(config: &Config) -> Self {
        Self {
            refresh_after: chrono::Duration::hours(config.store.refresh_after_hours),
            max_topics: config.summarizer.max_topics,
            stream_buffer: config.concurrency.stream_buffer.max(1),
            max_concurrent_summaries: config.concurrency.max_concurrent_summaries.max(1),
            worker_limit: config
                .concurrency
                .max_concurrent_fetches
                .max(config.concurrency.max_concurrent_summaries)
                .max(1),
            max_results: config.youtube.max_results,
        }
    }
}

/// Resolved query: ranking, fresh store hits and the ids left to fetch.
struct SearchPlan {
    query: String,
    ranking: Vec<VideoId>,
    fresh: Vec<VideoRecord>,
    to_fetch: Vec<VideoId>,
    offline: bool,
}

pub struct SearchOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn VideoStore>,
    summarizer: Arc<dyn Summarizer>,
    labeler: Arc<dyn TopicLabeler>,
    history: Arc<HistoryExporter>,
    summary_permits: Arc<Semaphore>,
    settings: SearchSettings,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn VideoStore>,
        summarizer: Arc<dyn Summarizer>,
        labeler: Arc<dyn TopicLabeler>,
        history: Arc<HistoryExporter>,
        settings: SearchSettings,
    ) -> Self {
        if !labeler.is_deterministic() {
            info!(
                labeler = labeler.name(),
                "Topic labeler is non-deterministic; topics may differ between identical searches"
            );
        }

        Self {
            fetcher,
            store,
            summarizer,
            labeler,
            history,
            summary_permits: Arc::new(Semaphore::new(settings.max_concurrent_summaries)),
            settings,
        }
    }

    /// Batch protocol: every result, in search ranking order. `max_results`
    /// overrides the configured result count.
    ///
    /// # Errors
    ///
    /// Fails on an invalid query or result count, on quota or rate-limit
    /// responses, and when neither the remote API nor the store can produce
    /// any result.
    pub async fn search(
        &self,
        query: &str,
        max_results: Option<u32>,
    ) -> Result<SearchOutcome, SearchError> {
        metrics::counter!("searches_total", "protocol" => "batch").increment(1);
        let plan = self.plan(query, max_results).await?;

        if plan.offline {
            let ids: Vec<VideoId> = plan.fresh.iter().map(|r| r.video_id.clone()).collect();
            let search_id = self.record(&plan.query, &ids).await;
            return Ok(SearchOutcome {
                results: plan.fresh,
                missing_ids: vec![],
                search_id,
                offline: true,
            });
        }

        let (fetched, missing_ids) = if plan.to_fetch.is_empty() {
            (vec![], vec![])
        } else {
            self.stage(&plan.query, SearchStage::Fetching);
            let batch = match self.fetcher.fetch_details(&plan.to_fetch).await {
                Ok(batch) => batch,
                Err(err) if plan.fresh.is_empty() => return Err(err.into()),
                Err(err) => {
                    warn!(event = "search_degraded", query = %plan.query, error = %err, "Serving stored results only");
                    let mut degraded = super::fetcher::DetailsBatch::default();
                    degraded.missing.clone_from(&plan.to_fetch);
                    degraded
                }
            };
            if batch.is_partial() {
                self.stage(&plan.query, SearchStage::PartialFailure);
            }

            let records: Vec<VideoRecord> = futures::stream::iter(batch.videos)
                .map(|details| self.process(details))
                .buffer_unordered(self.settings.worker_limit)
                .collect()
                .await;
            (records, batch.missing)
        };

        let mut by_id: HashMap<VideoId, VideoRecord> = plan
            .fresh
            .into_iter()
            .chain(fetched)
            .map(|r| (r.video_id.clone(), r))
            .collect();
        let results: Vec<VideoRecord> = plan
            .ranking
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();

        if results.is_empty() && !missing_ids.is_empty() {
            return Err(SearchError::Unavailable(
                "no video details could be fetched".to_string(),
            ));
        }

        self.stage(&plan.query, SearchStage::Emit);
        let ids: Vec<VideoId> = results.iter().map(|r| r.video_id.clone()).collect();
        let search_id = self.record(&plan.query, &ids).await;

        Ok(SearchOutcome {
            results,
            missing_ids,
            search_id,
            offline: false,
        })
    }

    /// Stream protocol. Validation and the initial remote search happen
    /// before this returns, so those failures are ordinary errors; after that
    /// every outcome arrives on the channel and ends with one
    /// [`StreamItem::Done`]. Dropping the receiver stops the producer.
    ///
    /// # Errors
    ///
    /// Same as [`search`](Self::search) up to the point where ids are known.
    pub async fn search_stream(
        self: Arc<Self>,
        query: &str,
        max_results: Option<u32>,
    ) -> Result<mpsc::Receiver<StreamItem>, SearchError> {
        metrics::counter!("searches_total", "protocol" => "stream").increment(1);
        let plan = self.plan(query, max_results).await?;

        let (tx, rx) = mpsc::channel(self.settings.stream_buffer);
        tokio::spawn(async move { self.produce(plan, tx).await });
        Ok(rx)
    }

    async fn produce(&self, plan: SearchPlan, tx: mpsc::Sender<StreamItem>) {
        let mut emitted: Vec<VideoId> = Vec::new();

        for record in plan.fresh {
            let id = record.video_id.clone();
            if tx.send(StreamItem::Video(Box::new(record))).await.is_err() {
                self.cancelled(&plan.query, emitted.len());
                return;
            }
            emitted.push(id);
        }

        let mut missing_ids = Vec::new();
        let mut failure = None;

        if !plan.to_fetch.is_empty() {
            self.stage(&plan.query, SearchStage::Fetching);

            let fetched = tokio::select! {
                () = tx.closed() => {
                    self.cancelled(&plan.query, emitted.len());
                    return;
                }
                result = self.fetcher.fetch_details(&plan.to_fetch) => result,
            };

            match fetched {
                Ok(batch) => {
                    if batch.is_partial() {
                        self.stage(&plan.query, SearchStage::PartialFailure);
                    }
                    missing_ids = batch.missing;

                    let mut work = futures::stream::iter(batch.videos)
                        .map(|details| self.process(details))
                        .buffer_unordered(self.settings.worker_limit);

                    loop {
                        let next = tokio::select! {
                            () = tx.closed() => {
                                self.cancelled(&plan.query, emitted.len());
                                return;
                            }
                            next = work.next() => next,
                        };
                        let Some(record) = next else { break };

                        let id = record.video_id.clone();
                        if tx.send(StreamItem::Video(Box::new(record))).await.is_err() {
                            self.cancelled(&plan.query, emitted.len());
                            return;
                        }
                        emitted.push(id);
                    }
                }
                Err(err) => {
                    warn!(event = "stream_fetch_failed", query = %plan.query, error = %err);
                    missing_ids.clone_from(&plan.to_fetch);
                    failure = Some(SearchError::from(err).to_string());
                }
            }
        }

        // History keeps the search ranking, not completion order.
        let position: HashMap<&VideoId, usize> =
            plan.ranking.iter().enumerate().map(|(i, id)| (id, i)).collect();
        emitted.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));

        let search_id = if emitted.is_empty() && failure.is_some() {
            None
        } else {
            self.record(&plan.query, &emitted).await
        };

        let _ = tx
            .send(StreamItem::Done(StreamEnd {
                done: true,
                missing_ids,
                search_id,
                error: failure,
                offline: plan.offline,
            }))
            .await;
        self.stage(&plan.query, SearchStage::Done);
    }

    fn cancelled(&self, query: &str, emitted: usize) {
        info!(event = "stream_cancelled", query = %query, emitted, "Client went away, stopping search");
    }

    fn stage(&self, query: &str, stage: SearchStage) {
        debug!(event = "search_stage", query = %query, stage = stage.as_str());
    }

    /// Topic labels shared by a set of transcripts.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] when no transcript has any text.
    pub async fn extract_topics(
        &self,
        transcripts: Vec<String>,
    ) -> Result<Vec<String>, SearchError> {
        if transcripts.iter().all(|t| t.trim().is_empty()) {
            return Err(SearchError::Validation(
                "Transcripts list cannot be empty".to_string(),
            ));
        }

        let labeler = Arc::clone(&self.labeler);
        let max_topics = self.settings.max_topics;
        tokio::task::spawn_blocking(move || {
            extract_topics(labeler.as_ref(), &transcripts, max_topics)
        })
        .await
        .map_err(|err| SearchError::Unavailable(format!("topic extraction failed: {err}")))
    }

    async fn plan(
        &self,
        query: &str,
        max_results: Option<u32>,
    ) -> Result<SearchPlan, SearchError> {
        let query = validate_query(query)?;
        let max_results = validate_max_results(max_results, self.settings.max_results)?;
        self.stage(&query, SearchStage::CacheCheck);

        let ranking = match self.fetcher.search(&query, max_results).await {
            Ok(ids) => dedupe(ids),
            Err(err @ (FetchError::QuotaExceeded(_) | FetchError::RateLimited(_))) => {
                warn!(event = "search_rejected", query = %query, error = %err);
                return Err(err.into());
            }
            Err(err) => return self.offline_plan(query, max_results, err).await,
        };

        let stored = match self.store.get_videos(&ranking).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(event = "store_lookup_failed", query = %query, error = %err);
                vec![]
            }
        };

        let cutoff = Utc::now() - self.settings.refresh_after;
        let mut fresh_by_id: HashMap<VideoId, VideoRecord> = stored
            .into_iter()
            .filter(|s| s.fetched_at >= cutoff)
            .map(|s| (s.record.video_id.clone(), s.record))
            .collect();

        let mut fresh = Vec::new();
        let mut to_fetch = Vec::new();
        for id in &ranking {
            match fresh_by_id.remove(id) {
                Some(record) => fresh.push(record),
                None => to_fetch.push(id.clone()),
            }
        }

        debug!(
            event = "search_planned",
            query = %query,
            candidates = ranking.len(),
            from_store = fresh.len(),
            to_fetch = to_fetch.len()
        );

        Ok(SearchPlan {
            query,
            ranking,
            fresh,
            to_fetch,
            offline: false,
        })
    }

    async fn offline_plan(
        &self,
        query: String,
        max_results: u32,
        cause: FetchError,
    ) -> Result<SearchPlan, SearchError> {
        warn!(event = "search_offline", query = %query, error = %cause, "Remote search failed, falling back to stored index");

        let records = self
            .store
            .search_text(&query, u64::from(max_results))
            .await
            .unwrap_or_else(|err| {
                warn!(event = "offline_lookup_failed", error = %err);
                vec![]
            });

        if records.is_empty() {
            return Err(SearchError::Unavailable(cause.to_string()));
        }

        Ok(SearchPlan {
            query,
            ranking: records.iter().map(|r| r.video_id.clone()).collect(),
            fresh: records,
            to_fetch: vec![],
            offline: true,
        })
    }

    /// Transcript, summary and persistence for one fetched video.
    async fn process(&self, details: VideoDetails) -> VideoRecord {
        let transcript = match self.fetcher.transcript(&details.video_id).await {
            Ok(text) => text,
            Err(err) => {
                debug!(event = "transcript_unavailable", video_id = %details.video_id, error = %err);
                String::new()
            }
        };

        let record = self.summarize(details, transcript).await;

        if let Err(err) = self.store.upsert(&record).await {
            if err.is_busy() {
                warn!(event = "persist_skipped", video_id = %record.video_id, error = %err, "Store busy, result not persisted");
            } else {
                error!(event = "persist_failed", video_id = %record.video_id, error = %err);
            }
        }

        record
    }

    async fn summarize(&self, details: VideoDetails, transcript: String) -> VideoRecord {
        let _permit = self.summary_permits.acquire().await.ok();

        let document = if transcript.is_empty() {
            details.description.clone()
        } else {
            format!("{} {}", details.description, transcript)
        };
        let summarizer = Arc::clone(&self.summarizer);
        let labeler = Arc::clone(&self.labeler);
        let max_topics = self.settings.max_topics;

        let (summary, topics) = tokio::task::spawn_blocking(move || {
            summarize_document(summarizer.as_ref(), labeler.as_ref(), &document, max_topics)
        })
        .await
        .unwrap_or_else(|err| {
            error!(event = "summarize_failed", error = %err);
            (
                Summary {
                    text: EMPTY_SUMMARY.to_string(),
                    ..Summary::default()
                },
                vec![],
            )
        });

        VideoRecord::from_details(details, summary.text, summary.talking_points, topics)
    }

    async fn record(&self, query: &str, ids: &[VideoId]) -> Option<SearchId> {
        self.stage(query, SearchStage::Recording);
        match self.history.record(query, ids).await {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(event = "history_record_failed", query = %query, error = %err);
                None
            }
        }
    }
}

/// Trims the query and rejects empty or oversized input.
pub fn validate_query(query: &str) -> Result<String, SearchError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(SearchError::Validation("Query must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_QUERY_CHARS {
        return Err(SearchError::Validation(format!(
            "Query must be at most {MAX_QUERY_CHARS} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(SearchError::Validation(
            "Query must not contain control characters".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Applies the default and rejects counts the search endpoint cannot serve.
pub fn validate_max_results(requested: Option<u32>, default: u32) -> Result<u32, SearchError> {
    match requested {
        None => Ok(default),
        Some(n) if (1..=MAX_SEARCH_RESULTS).contains(&n) => Ok(n),
        Some(_) => Err(SearchError::Validation(format!(
            "max_results must be between 1 and {MAX_SEARCH_RESULTS}"
        ))),
    }
}

fn dedupe(ids: Vec<VideoId>) -> Vec<VideoId> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, ConcurrencyConfig, RetryConfig, YouTubeConfig};
    use crate::db::Store;
    use crate::services::cache::{CachedFetcher, ResponseCache};
    use crate::services::fetcher::RemoteFetcher;
    use crate::services::summarizer::{ExtractiveSummarizer, KeywordTopicLabeler};
    use crate::services::test_support::FakePlatform;

    struct Harness {
        orchestrator: Arc<SearchOrchestrator>,
        platform: Arc<FakePlatform>,
        store: Arc<Store>,
    }

    /// Store whose writes always report a locked database.
    struct BusyStore(Arc<Store>);

    #[async_trait::async_trait]
    impl VideoStore for BusyStore {
        async fn upsert(&self, _record: &VideoRecord) -> Result<(), StoreError> {
            Err(StoreError::Busy { attempts: 5 })
        }

        async fn get_videos(
            &self,
            ids: &[VideoId],
        ) -> Result<Vec<crate::db::StoredVideo>, StoreError> {
            self.0.get_videos(ids).await
        }

        async fn search_text(
            &self,
            query: &str,
            limit: u64,
        ) -> Result<Vec<VideoRecord>, StoreError> {
            self.0.search_text(query, limit).await
        }

        async fn videos_for_channel(
            &self,
            channel: &crate::domain::ChannelId,
        ) -> Result<Vec<VideoRecord>, StoreError> {
            self.0.videos_for_channel(channel).await
        }

        async fn samples_for_topic(
            &self,
            topic: &str,
        ) -> Result<Vec<crate::domain::StatSample>, StoreError> {
            self.0.samples_for_topic(topic).await
        }

        async fn record_search(
            &self,
            query: &str,
            video_ids: &[VideoId],
        ) -> Result<SearchId, StoreError> {
            self.0.record_search(query, video_ids).await
        }

        async fn list_history(
            &self,
            limit: u64,
        ) -> Result<Vec<crate::domain::HistoryEntry>, StoreError> {
            self.0.list_history(limit).await
        }

        async fn get_history(
            &self,
            id: SearchId,
        ) -> Result<Option<crate::domain::HistoryEntry>, StoreError> {
            self.0.get_history(id).await
        }

        async fn run_maintenance(&self) -> Result<crate::db::MaintenanceReport, StoreError> {
            self.0.run_maintenance().await
        }

        async fn counts(&self) -> Result<crate::db::StoreCounts, StoreError> {
            self.0.counts().await
        }
    }

    async fn harness(platform: FakePlatform, batch_size: usize) -> Harness {
        harness_with(platform, batch_size, |store| store as Arc<dyn VideoStore>).await
    }

    async fn harness_with(
        platform: FakePlatform,
        batch_size: usize,
        wrap: impl FnOnce(Arc<Store>) -> Arc<dyn VideoStore>,
    ) -> Harness {
        let platform = Arc::new(platform);
        let store = Arc::new(Store::new("sqlite::memory:").await.unwrap());
        let facade = wrap(store.clone());

        let config = Config {
            youtube: YouTubeConfig {
                batch_size,
                max_results: 50,
                ..YouTubeConfig::default()
            },
            retry: RetryConfig {
                max_attempts: 2,
                base_delay_ms: 1,
                backoff_multiplier: 2.0,
            },
            ..Config::default()
        };

        let remote = RemoteFetcher::new(
            platform.clone(),
            &config.youtube,
            &config.retry,
            &ConcurrencyConfig::default(),
        );
        let fetcher = CachedFetcher::new(Arc::new(remote), ResponseCache::new(CacheConfig::default()));
        let history = Arc::new(HistoryExporter::new(facade.clone()));

        let orchestrator = Arc::new(SearchOrchestrator::new(
            Arc::new(fetcher),
            facade,
            Arc::new(ExtractiveSummarizer::new(config.summarizer.clone())),
            Arc::new(KeywordTopicLabeler),
            history,
            SearchSettings::from(&config),
        ));

        Harness {
            orchestrator,
            platform,
            store,
        }
    }

    #[tokio::test]
    async fn batch_results_follow_search_ranking() {
        let h = harness(FakePlatform::with_videos(12), 5).await;

        let outcome = h.orchestrator.search("AI ethics", None).await.unwrap();

        let ids: Vec<VideoId> = outcome.results.iter().map(|r| r.video_id.clone()).collect();
        assert_eq!(ids, h.platform.ids());
        assert_eq!(h.platform.detail_calls(), 3);
        assert!(outcome.missing_ids.is_empty());
        assert!(outcome.search_id.is_some());
        assert!(outcome.results[0].summary.contains("ethics"));
    }

    #[tokio::test]
    async fn repeated_search_makes_no_remote_calls() {
        let h = harness(FakePlatform::with_videos(4), 50).await;

        h.orchestrator.search("AI ethics", None).await.unwrap();
        let calls = (
            h.platform.search_calls(),
            h.platform.detail_calls(),
            h.platform.transcript_calls(),
        );
        let again = h.orchestrator.search("AI ethics", None).await.unwrap();

        assert_eq!(again.results.len(), 4);
        assert_eq!(
            (
                h.platform.search_calls(),
                h.platform.detail_calls(),
                h.platform.transcript_calls(),
            ),
            calls
        );
    }

    #[tokio::test]
    async fn partial_failure_returns_subset_with_missing_ids() {
        let h = harness(FakePlatform::with_videos(6).failing_on("vid05"), 3).await;

        let outcome = h.orchestrator.search("AI ethics", None).await.unwrap();

        assert_eq!(outcome.results.len(), 3);
        assert_eq!(
            outcome.missing_ids,
            vec![VideoId::new("vid04"), VideoId::new("vid05"), VideoId::new("vid06")]
        );
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_any_remote_call() {
        let h = harness(FakePlatform::with_videos(2), 50).await;

        let err = h.orchestrator.search("   ", None).await.unwrap_err();

        assert!(matches!(err, SearchError::Validation(_)));
        assert_eq!(h.platform.search_calls(), 0);
    }

    #[tokio::test]
    async fn quota_errors_surface_immediately() {
        let platform = FakePlatform::with_videos(2)
            .failing_search_with(FetchError::QuotaExceeded("daily".into()));
        let h = harness(platform, 50).await;

        let err = h.orchestrator.search("rust", None).await.unwrap_err();

        assert!(matches!(err, SearchError::QuotaExceeded));
        assert_eq!(h.platform.search_calls(), 1);
    }

    #[tokio::test]
    async fn unreachable_api_falls_back_to_stored_index() {
        let warm = harness(FakePlatform::with_videos(3), 50).await;
        warm.orchestrator.search("AI ethics", None).await.unwrap();

        let platform = FakePlatform::with_videos(3)
            .failing_search_with(FetchError::Transient("connection refused".into()));
        let cold = harness(platform, 50).await;
        // Reuse the warmed store behind the failing platform.
        let history = Arc::new(HistoryExporter::new(warm.store.clone()));
        let remote = RemoteFetcher::new(
            cold.platform.clone(),
            &YouTubeConfig::default(),
            &RetryConfig {
                max_attempts: 1,
                base_delay_ms: 1,
                backoff_multiplier: 1.0,
            },
            &ConcurrencyConfig::default(),
        );
        let orchestrator = Arc::new(SearchOrchestrator::new(
            Arc::new(remote),
            warm.store.clone(),
            Arc::new(ExtractiveSummarizer::new(Default::default())),
            Arc::new(KeywordTopicLabeler),
            history,
            SearchSettings::from(&Config::default()),
        ));

        let outcome = orchestrator.search("ethics", None).await.unwrap();
        assert!(outcome.offline);
        assert_eq!(outcome.results.len(), 3);

        let mut rx = orchestrator.clone().search_stream("ethics", None).await.unwrap();
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        assert_eq!(items.len(), 4);
        let Some(StreamItem::Done(end)) = items.last() else {
            panic!("stream must end with a done marker");
        };
        assert!(end.offline);
        let line = serde_json::to_value(end).unwrap();
        assert_eq!(line["offline"], true);

        let empty = cold.orchestrator.search("ethics", None).await.unwrap_err();
        assert!(matches!(empty, SearchError::Unavailable(_)));
    }

    #[tokio::test]
    async fn stream_ends_with_single_done_marker() {
        let h = harness(FakePlatform::with_videos(5), 2).await;

        let mut rx = h.orchestrator.clone().search_stream("AI ethics", None).await.unwrap();
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }

        let done: Vec<&StreamItem> = items
            .iter()
            .filter(|i| matches!(i, StreamItem::Done(_)))
            .collect();
        assert_eq!(done.len(), 1);
        assert!(matches!(items.last(), Some(StreamItem::Done(end)) if end.error.is_none()));
        assert_eq!(items.len(), 6);
        if let Some(StreamItem::Done(end)) = items.last() {
            let line = serde_json::to_value(end).unwrap();
            assert!(line.get("offline").is_none());
        }

        let history = h.store.list_history(1).await.unwrap();
        assert_eq!(history[0].video_ids, h.platform.ids());
    }

    #[tokio::test]
    async fn dropped_stream_is_not_recorded() {
        let platform = FakePlatform::with_videos(6).with_latency(std::time::Duration::from_millis(30));
        let h = harness(platform, 1).await;

        let rx = h.orchestrator.clone().search_stream("AI ethics", None).await.unwrap();
        drop(rx);
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        assert!(h.store.list_history(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn busy_store_still_returns_every_result() {
        let h = harness_with(FakePlatform::with_videos(3), 50, |store| {
            Arc::new(BusyStore(store)) as Arc<dyn VideoStore>
        })
        .await;

        let outcome = h.orchestrator.search("AI ethics", None).await.unwrap();
        let ids: Vec<VideoId> = outcome.results.iter().map(|r| r.video_id.clone()).collect();
        assert_eq!(ids, h.platform.ids());
        assert!(outcome.search_id.is_some());

        let mut rx = h.orchestrator.clone().search_stream("AI ethics", None).await.unwrap();
        let mut streamed = Vec::new();
        while let Some(item) = rx.recv().await {
            if let StreamItem::Video(record) = item {
                streamed.push(record.video_id);
            }
        }
        streamed.sort();
        assert_eq!(streamed, h.platform.ids());

        assert_eq!(h.store.counts().await.unwrap().videos, 0);
    }

    #[tokio::test]
    async fn result_count_can_be_overridden_per_request() {
        let h = harness(FakePlatform::with_videos(8), 50).await;

        let outcome = h.orchestrator.search("AI ethics", Some(3)).await.unwrap();
        assert_eq!(outcome.results.len(), 3);

        for rejected in [0, MAX_SEARCH_RESULTS + 1] {
            let err = h.orchestrator.search("AI ethics", Some(rejected)).await.unwrap_err();
            assert!(matches!(err, SearchError::Validation(_)));
        }
        assert_eq!(h.platform.search_calls(), 1);
    }

    #[tokio::test]
    async fn topics_are_extracted_from_transcripts() {
        let h = harness(FakePlatform::with_videos(1), 50).await;

        let topics = h
            .orchestrator
            .extract_topics(vec![
                "Solar panels convert sunlight. Solar farms need land.".to_string(),
                "Battery storage smooths solar output.".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(topics.first().map(String::as_str), Some("solar"));

        let err = h.orchestrator.extract_topics(vec![]).await.unwrap_err();
        assert!(matches!(err, SearchError::Validation(_)));
        let blank = h.orchestrator.extract_topics(vec!["  ".to_string()]).await;
        assert!(matches!(blank, Err(SearchError::Validation(_))));
    }

    #[test]
    fn max_results_validation() {
        assert_eq!(validate_max_results(None, 10).unwrap(), 10);
        assert_eq!(validate_max_results(Some(50), 10).unwrap(), 50);
        assert!(validate_max_results(Some(0), 10).is_err());
        assert!(validate_max_results(Some(51), 10).is_err());
    }

    #[test]
    fn query_validation() {
        assert_eq!(validate_query("  rust  ").unwrap(), "rust");
        assert!(validate_query("").is_err());
        assert!(validate_query(&"x".repeat(201)).is_err());
        assert!(validate_query("bad\u{0007}query").is_err());
    }
}
