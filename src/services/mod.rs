pub mod cache;
pub use cache::{CachedFetcher, ResponseCache};

pub mod channel;
pub use channel::ChannelAnalyzer;

pub mod fetcher;
pub use fetcher::{DetailsBatch, Fetcher, RemoteFetcher};

pub mod history;
pub use history::{ExportFormat, HistoryError, HistoryExporter, Report};

pub mod retry;
pub use retry::RetryPolicy;

pub mod scheduler;
pub use scheduler::{Maintenance, MaintenanceScheduler};

pub mod search;
pub use search::{SearchError, SearchOrchestrator, SearchOutcome, SearchSettings, StreamItem};

pub mod summarizer;
pub use summarizer::{ExtractiveSummarizer, KeywordTopicLabeler, Summarizer, TopicLabeler};

pub mod trends;
pub use trends::TrendAggregator;

#[cfg(test)]
pub(crate) mod test_support;
