use crate::config::{Config, StoreConfig};
use crate::domain::{ChannelId, HistoryEntry, SearchId, StatSample, VideoId, VideoRecord};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, RuntimeErr, sqlx,
};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub mod migrator;
pub mod repositories;

pub use repositories::video::StoredVideo;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store is busy, gave up after {attempts} attempts")]
    Busy { attempts: u32 },

    #[error("Store operation '{0}' timed out")]
    Timeout(&'static str),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Busy and timeout failures leave the store consistent; the write can
    /// simply be skipped.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. } | Self::Timeout(_))
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::Json(msg) => Self::Serialization(msg),
            DbErr::RecordNotFound(msg) => Self::NotFound(msg),
            other => Self::Database(other.to_string()),
        }
    }
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// True when SQLite reported `SQLITE_BUSY` or `SQLITE_LOCKED`, including
/// their extended codes.
fn is_locked(err: &DbErr) -> bool {
    let (DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
    | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
    | DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(db)))) = err
    else {
        return false;
    };
    db.code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePolicy {
    pub max_videos_retained: u64,
    pub busy_retries: u32,
    pub busy_backoff: Duration,
    pub operation_timeout: Duration,
}

impl From<&StoreConfig> for StorePolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            max_videos_retained: config.max_videos_retained,
            busy_retries: config.busy_retries.max(1),
            busy_backoff: Duration::from_millis(config.busy_backoff_ms),
            operation_timeout: Duration::from_secs(config.operation_timeout_seconds.max(1)),
        }
    }
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub pruned_videos: u64,
    pub pruned_searches: u64,
    pub swept_cache_entries: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub videos: u64,
    pub searches: u64,
}

/// Persistence surface used by the search pipeline and the analyzers.
#[async_trait::async_trait]
pub trait VideoStore: Send + Sync {
    /// Inserts or updates by video id and appends a stats sample.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Busy`] when the database stays locked past the
    /// bounded busy backoff.
    async fn upsert(&self, record: &VideoRecord) -> Result<(), StoreError>;

    async fn get_videos(&self, ids: &[VideoId]) -> Result<Vec<StoredVideo>, StoreError>;

    async fn search_text(&self, query: &str, limit: u64) -> Result<Vec<VideoRecord>, StoreError>;

    async fn videos_for_channel(&self, channel: &ChannelId)
    -> Result<Vec<VideoRecord>, StoreError>;

    async fn samples_for_topic(&self, topic: &str) -> Result<Vec<StatSample>, StoreError>;

    async fn record_search(
        &self,
        query: &str,
        video_ids: &[VideoId],
    ) -> Result<SearchId, StoreError>;

    /// Most recent first.
    async fn list_history(&self, limit: u64) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn get_history(&self, id: SearchId) -> Result<Option<HistoryEntry>, StoreError>;

    /// Enforces the retention cap and compacts the file. Concurrent calls run
    /// one after another.
    async fn run_maintenance(&self) -> Result<MaintenanceReport, StoreError>;

    async fn counts(&self) -> Result<StoreCounts, StoreError>;
}

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    policy: StorePolicy,
    write_lock: Arc<Mutex<()>>,
    maintenance_lock: Arc<Mutex<()>>,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_options(db_url, 5, 1, StorePolicy::default()).await
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::with_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
            StorePolicy::from(&config.store),
        )
        .await
    }

    pub async fn with_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
        policy: StorePolicy,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite://").trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.connect_timeout(Duration::from_secs(10))
            .acquire_timeout(policy.operation_timeout)
            .sqlx_logging(false);

        if in_memory {
            // Every pooled connection to an in-memory database must be the
            // same connection, or the data disappears with it.
            opt.max_connections(1).min_connections(1);
        } else {
            opt.max_connections(max_connections)
                .min_connections(min_connections)
                .idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        if !in_memory {
            conn.execute_unprepared("PRAGMA journal_mode=WAL").await?;
        }

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self {
            conn,
            policy,
            write_lock: Arc::new(Mutex::new(())),
            maintenance_lock: Arc::new(Mutex::new(())),
        })
    }

    fn video_repo(&self) -> repositories::video::VideoRepository {
        repositories::video::VideoRepository::new(self.conn.clone())
    }

    fn history_repo(&self) -> repositories::history::HistoryRepository {
        repositories::history::HistoryRepository::new(self.conn.clone())
    }

    /// Runs `op` under the operation timeout, retrying briefly while the
    /// database reports itself locked. Writers also hold the single-writer
    /// lock for the whole attempt sequence.
    async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        exclusive: bool,
        mut op: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        let _writer = if exclusive {
            let guard = tokio::time::timeout(self.policy.operation_timeout, self.write_lock.lock())
                .await
                .map_err(|_| StoreError::Busy { attempts: 0 })?;
            Some(guard)
        } else {
            None
        };

        let mut attempt = 1;
        loop {
            let outcome = tokio::time::timeout(self.policy.operation_timeout, op())
                .await
                .map_err(|_| StoreError::Timeout(operation))?;

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if is_locked(&err) && attempt < self.policy.busy_retries => {
                    warn!(event = "store_busy_retry", operation, attempt, error = %err);
                    metrics::counter!("store_busy_retries_total", "operation" => operation)
                        .increment(1);
                    tokio::time::sleep(self.policy.busy_backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) if is_locked(&err) => {
                    warn!(event = "store_busy", operation, attempts = attempt, "Giving up on locked store");
                    return Err(StoreError::Busy { attempts: attempt });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Upsert with an explicit fetch time, for backfills and tests.
    pub async fn upsert_at(
        &self,
        record: &VideoRecord,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.run("upsert", true, || {
            let repo = self.video_repo();
            async move { repo.upsert(record, fetched_at).await }
        })
        .await
    }
}

#[async_trait::async_trait]
impl VideoStore for Store {
    async fn upsert(&self, record: &VideoRecord) -> Result<(), StoreError> {
        self.upsert_at(record, Utc::now()).await
    }

    async fn get_videos(&self, ids: &[VideoId]) -> Result<Vec<StoredVideo>, StoreError> {
        self.run("get_videos", false, || {
            let repo = self.video_repo();
            async move { repo.get_many(ids).await }
        })
        .await
    }

    async fn search_text(&self, query: &str, limit: u64) -> Result<Vec<VideoRecord>, StoreError> {
        self.run("search_text", false, || {
            let repo = self.video_repo();
            async move { repo.search_text(query, limit).await }
        })
        .await
    }

    async fn videos_for_channel(
        &self,
        channel: &ChannelId,
    ) -> Result<Vec<VideoRecord>, StoreError> {
        self.run("videos_for_channel", false, || {
            let repo = self.video_repo();
            async move { repo.for_channel(channel).await }
        })
        .await
    }

    async fn samples_for_topic(&self, topic: &str) -> Result<Vec<StatSample>, StoreError> {
        self.run("samples_for_topic", false, || {
            let repo = self.video_repo();
            async move { repo.samples_for_topic(topic).await }
        })
        .await
    }

    async fn record_search(
        &self,
        query: &str,
        video_ids: &[VideoId],
    ) -> Result<SearchId, StoreError> {
        let at = Utc::now();
        self.run("record_search", true, || {
            let repo = self.history_repo();
            async move { repo.record(query, video_ids, at).await }
        })
        .await
    }

    async fn list_history(&self, limit: u64) -> Result<Vec<HistoryEntry>, StoreError> {
        self.run("list_history", false, || {
            let repo = self.history_repo();
            async move { repo.list(limit).await }
        })
        .await
    }

    async fn get_history(&self, id: SearchId) -> Result<Option<HistoryEntry>, StoreError> {
        self.run("get_history", false, || {
            let repo = self.history_repo();
            async move { repo.get(id).await }
        })
        .await
    }

    async fn run_maintenance(&self) -> Result<MaintenanceReport, StoreError> {
        let _serial = self.maintenance_lock.lock().await;
        let keep = self.policy.max_videos_retained;

        let pruned_videos = self
            .run("prune_videos", true, || {
                let repo = self.video_repo();
                async move { repo.prune(keep).await }
            })
            .await?;

        let pruned_searches = self
            .run("prune_history", true, || {
                let repo = self.history_repo();
                async move { repo.prune_orphans().await }
            })
            .await?;

        self.run("vacuum", true, || {
            let conn = self.conn.clone();
            async move { conn.execute_unprepared("VACUUM").await.map(|_| ()) }
        })
        .await?;

        info!(
            event = "store_maintenance",
            pruned_videos, pruned_searches, keep, "Store maintenance finished"
        );

        Ok(MaintenanceReport {
            pruned_videos,
            pruned_searches,
            swept_cache_entries: 0,
        })
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let videos = self
            .run("count_videos", false, || {
                let repo = self.video_repo();
                async move { repo.count().await }
            })
            .await?;
        let searches = self
            .run("count_searches", false, || {
                let repo = self.history_repo();
                async move { repo.count().await }
            })
            .await?;
        Ok(StoreCounts { videos, searches })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChannelId;
    use chrono::TimeZone;
    use std::borrow::Cow;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct CodedError(&'static str);

    impl std::fmt::Display for CodedError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "sqlite error {}", self.0)
        }
    }

    impl std::error::Error for CodedError {}

    impl sqlx::error::DatabaseError for CodedError {
        fn message(&self) -> &str {
            "database is busy"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn sqlite_error(code: &'static str) -> DbErr {
        DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(Box::new(
            CodedError(code),
        ))))
    }

    async fn memory_store(max_videos: u64) -> Store {
        let policy = StorePolicy {
            max_videos_retained: max_videos,
            ..StorePolicy::default()
        };
        Store::with_options("sqlite::memory:", 1, 1, policy)
            .await
            .unwrap()
    }

    fn record(id: &str, channel: &str, title: &str, summary: &str, views: u64) -> VideoRecord {
        VideoRecord {
            video_id: VideoId::new(id),
            title: title.to_string(),
            channel_id: ChannelId::new(channel),
            channel: "Channel".to_string(),
            published_at: None,
            duration_seconds: 300,
            view_count: views,
            like_count: 0,
            url: VideoId::new(id).watch_url(),
            summary: summary.to_string(),
            talking_points: vec!["point one".to_string()],
            topics: vec!["topic".to_string()],
        }
    }

    #[test]
    fn locked_errors_are_classified_by_result_code() {
        assert!(is_locked(&sqlite_error("5")));
        assert!(is_locked(&sqlite_error("6")));
        // SQLITE_BUSY_SNAPSHOT and SQLITE_LOCKED_SHAREDCACHE
        assert!(is_locked(&sqlite_error("517")));
        assert!(is_locked(&sqlite_error("262")));

        // SQLITE_CONSTRAINT_UNIQUE, even when the message mentions "busy"
        assert!(!is_locked(&sqlite_error("2067")));
        assert!(!is_locked(&DbErr::Custom("busy signal".to_string())));
        assert!(!is_locked(&DbErr::RecordNotFound("table is locked".to_string())));
    }

    #[tokio::test]
    async fn busy_retries_stop_at_the_configured_bound() {
        let policy = StorePolicy {
            busy_retries: 3,
            busy_backoff: Duration::from_millis(1),
            ..StorePolicy::default()
        };
        let store = Store::with_options("sqlite::memory:", 1, 1, policy)
            .await
            .unwrap();
        let attempts = AtomicU32::new(0);

        let result: Result<(), StoreError> = store
            .run("always_busy", true, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(sqlite_error("5")) }
            })
            .await;

        assert!(matches!(result, Err(StoreError::Busy { attempts: 3 })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let failed: Result<(), StoreError> = store
            .run("constraint", true, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(sqlite_error("2067")) }
            })
            .await;
        assert!(matches!(failed, Err(StoreError::Database(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn busy_store_recovers_once_the_lock_clears() {
        let policy = StorePolicy {
            busy_retries: 3,
            busy_backoff: Duration::from_millis(1),
            ..StorePolicy::default()
        };
        let store = Store::with_options("sqlite::memory:", 1, 1, policy)
            .await
            .unwrap();
        let attempts = AtomicU32::new(0);

        let value = store
            .run("flaky", false, || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(sqlite_error("5"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let store = memory_store(100).await;

        store
            .upsert(&record("a", "UC1", "First title", "summary", 10))
            .await
            .unwrap();
        store
            .upsert(&record("a", "UC1", "Second title", "summary", 20))
            .await
            .unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.videos, 1);

        let stored = store.get_videos(&[VideoId::new("a")]).await.unwrap();
        assert_eq!(stored[0].record.title, "Second title");
        assert_eq!(stored[0].record.view_count, 20);
        assert_eq!(stored[0].record.talking_points, vec!["point one"]);
    }

    #[tokio::test]
    async fn text_search_ranks_by_relevance_then_views() {
        let store = memory_store(100).await;
        store
            .upsert(&record("a", "UC1", "Cooking pasta", "Italian food at home", 500))
            .await
            .unwrap();
        store
            .upsert(&record("b", "UC1", "AI ethics explained", "Ethics of machine learning", 10))
            .await
            .unwrap();
        store
            .upsert(&record("c", "UC2", "AI ethics explained", "Ethics of machine learning", 90))
            .await
            .unwrap();

        let found = store.search_text("ai ethics", 10).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.video_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);

        assert!(store.search_text("\"", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn maintenance_keeps_most_recent_rows() {
        let store = memory_store(3).await;
        for i in 0..5 {
            store
                .upsert(&record(&format!("v{i}"), "UC1", "Title", "Summary", i))
                .await
                .unwrap();
        }
        store
            .record_search("old", &[VideoId::new("v0"), VideoId::new("v1")])
            .await
            .unwrap();
        store
            .record_search("mixed", &[VideoId::new("v1"), VideoId::new("v4")])
            .await
            .unwrap();

        let report = store.run_maintenance().await.unwrap();

        assert_eq!(report.pruned_videos, 2);
        assert_eq!(report.pruned_searches, 1);

        let ids: Vec<VideoId> = (0..5).map(|i| VideoId::new(format!("v{i}"))).collect();
        let mut kept: Vec<String> = store
            .get_videos(&ids)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.record.video_id.to_string())
            .collect();
        kept.sort();
        assert_eq!(kept, vec!["v2", "v3", "v4"]);

        let history = store.list_history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].query, "mixed");
    }

    #[tokio::test]
    async fn maintenance_keeps_searches_without_results() {
        let store = memory_store(10).await;
        store
            .upsert(&record("a", "UC1", "Title", "Summary", 1))
            .await
            .unwrap();
        store.record_search("no hits", &[]).await.unwrap();

        let report = store.run_maintenance().await.unwrap();

        assert_eq!(report.pruned_videos, 0);
        assert_eq!(report.pruned_searches, 0);
        let history = store.list_history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].query, "no hits");
    }

    #[tokio::test]
    async fn history_is_listed_newest_first() {
        let store = memory_store(10).await;
        let first = store.record_search("one", &[]).await.unwrap();
        let second = store.record_search("two", &[VideoId::new("x")]).await.unwrap();
        assert!(second > first);

        let history = store.list_history(10).await.unwrap();
        assert_eq!(history[0].query, "two");
        assert_eq!(history[0].video_ids, vec![VideoId::new("x")]);

        let fetched = store.get_history(first).await.unwrap().unwrap();
        assert_eq!(fetched.query, "one");
        assert!(store.get_history(SearchId::new(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn topic_samples_follow_full_text_matches() {
        let store = memory_store(10).await;
        let day = |d| Utc.with_ymd_and_hms(2024, 5, d, 12, 0, 0).unwrap();

        store
            .upsert_at(&record("a", "UC1", "Rust async", "Tokio runtime", 100), day(1))
            .await
            .unwrap();
        store
            .upsert_at(&record("a", "UC1", "Rust async", "Tokio runtime", 150), day(2))
            .await
            .unwrap();
        store
            .upsert_at(&record("b", "UC1", "Gardening", "Tomatoes", 999), day(2))
            .await
            .unwrap();

        let samples = store.samples_for_topic("rust").await.unwrap();
        let views: Vec<u64> = samples.iter().map(|s| s.view_count).collect();
        assert_eq!(views, vec![100, 150]);
    }
}
