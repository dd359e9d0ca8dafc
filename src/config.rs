use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Per-call id limit of the YouTube Data API `videos.list` endpoint.
pub const MAX_BATCH_SIZE: usize = 50;

/// Largest `maxResults` the YouTube `search.list` endpoint accepts.
pub const MAX_SEARCH_RESULTS: u32 = 50;

pub const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub youtube: YouTubeConfig,

    pub retry: RetryConfig,

    pub cache: CacheConfig,

    pub store: StoreConfig,

    pub concurrency: ConcurrencyConfig,

    pub summarizer: SummarizerConfig,

    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/topicscout.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// Data API key. `YOUTUBE_API_KEY` from the environment takes precedence.
    pub api_key: String,

    pub base_url: String,

    pub transcript_url: String,

    pub transcript_language: String,

    /// Hard timeout for a single remote attempt, independent of retry backoff.
    pub request_timeout_seconds: u64,

    /// Candidates requested from the search endpoint.
    pub max_results: u32,

    /// Ids per details call (at most 50).
    pub batch_size: usize,

    pub fetch_transcripts: bool,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            transcript_url: "https://www.youtube.com/api/timedtext".to_string(),
            transcript_language: "en".to_string(),
            request_timeout_seconds: 15,
            max_results: 10,
            batch_size: MAX_BATCH_SIZE,
            fetch_transcripts: true,
        }
    }
}

impl YouTubeConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,

    pub base_delay_ms: u64,

    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub search_ttl_seconds: u64,

    pub details_ttl_seconds: u64,

    pub transcript_ttl_seconds: u64,

    /// Capacity of each namespace; least recently used entries go first.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_seconds: 3600,
            details_ttl_seconds: 3600,
            transcript_ttl_seconds: 24 * 3600,
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Retention cap on stored videos; oldest inserted rows are pruned first.
    pub max_videos_retained: u64,

    /// Stored videos older than this are re-fetched instead of served from the store.
    pub refresh_after_hours: i64,

    /// Attempts for a write that hits a locked database.
    pub busy_retries: u32,

    pub busy_backoff_ms: u64,

    pub operation_timeout_seconds: u64,

    pub maintenance_interval_hours: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_videos_retained: 1000,
            refresh_after_hours: 24,
            busy_retries: 5,
            busy_backoff_ms: 50,
            operation_timeout_seconds: 30,
            maintenance_interval_hours: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Remote calls in flight across all searches.
    pub max_concurrent_fetches: usize,

    /// Summarization jobs running at once (CPU bound).
    pub max_concurrent_summaries: usize,

    /// Items buffered between the stream producer and the HTTP writer.
    pub stream_buffer: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            max_concurrent_summaries: 4,
            stream_buffer: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub max_sentences: usize,

    pub max_talking_points: usize,

    pub max_topics: usize,

    pub frequency_weight: f64,

    pub position_weight: f64,

    pub length_weight: f64,

    /// Sentences with fewer content words than this are penalised.
    pub min_sentence_words: usize,

    /// Sentences with more content words than this are penalised.
    pub max_sentence_words: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_sentences: 3,
            max_talking_points: 5,
            max_topics: 5,
            frequency_weight: 0.6,
            position_weight: 0.3,
            length_weight: 0.1,
            min_sentence_words: 10,
            max_sentence_words: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_channel_topics: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_channel_topics: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// When false the stream endpoint answers with the batch body.
    pub streaming_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            streaming_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        let mut config = None;
        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                config = Some(Self::load_from_path(path)?);
                break;
            }
        }

        let mut config = config.unwrap_or_else(|| {
            info!("No config file found, using defaults");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("YOUTUBE_API_KEY")
            && !key.trim().is_empty()
        {
            self.youtube.api_key = key;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("topicscout").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".topicscout").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.youtube.batch_size == 0 || self.youtube.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!("youtube.batch_size must be between 1 and {MAX_BATCH_SIZE}");
        }

        if self.youtube.max_results == 0 || self.youtube.max_results > MAX_SEARCH_RESULTS {
            anyhow::bail!("youtube.max_results must be between 1 and {MAX_SEARCH_RESULTS}");
        }

        if self.youtube.request_timeout_seconds == 0 {
            anyhow::bail!("youtube.request_timeout_seconds must be > 0");
        }

        url::Url::parse(&self.youtube.base_url).context("Invalid youtube.base_url")?;
        url::Url::parse(&self.youtube.transcript_url).context("Invalid youtube.transcript_url")?;

        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            anyhow::bail!("retry.max_attempts must be between 1 and {MAX_RETRY_ATTEMPTS}");
        }

        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            anyhow::bail!("retry.backoff_multiplier must be a finite number >= 1.0");
        }

        if self.cache.max_entries == 0 {
            anyhow::bail!("cache.max_entries must be > 0");
        }

        if self.store.max_videos_retained == 0 {
            anyhow::bail!("store.max_videos_retained must be > 0");
        }

        if self.store.busy_retries == 0 || self.store.operation_timeout_seconds == 0 {
            anyhow::bail!("store.busy_retries and store.operation_timeout_seconds must be > 0");
        }

        if self.concurrency.max_concurrent_fetches == 0
            || self.concurrency.max_concurrent_summaries == 0
            || self.concurrency.stream_buffer == 0
        {
            anyhow::bail!("concurrency limits must be > 0");
        }

        if self.summarizer.min_sentence_words > self.summarizer.max_sentence_words {
            anyhow::bail!("summarizer.min_sentence_words cannot exceed max_sentence_words");
        }

        Ok(())
    }
}
