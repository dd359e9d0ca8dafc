use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clients::{VideoPlatform, YouTubeClient};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    CachedFetcher, ChannelAnalyzer, ExtractiveSummarizer, HistoryExporter, KeywordTopicLabeler,
    Maintenance, RemoteFetcher, ResponseCache, SearchOrchestrator, SearchSettings,
    TrendAggregator,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Arc<Store>,

    pub cache: ResponseCache,

    pub orchestrator: Arc<SearchOrchestrator>,

    pub history: Arc<HistoryExporter>,

    pub channels: Arc<ChannelAnalyzer>,

    pub trends: Arc<TrendAggregator>,

    pub maintenance: Maintenance,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(Store::from_config(&config).await?);
        let platform = Arc::new(YouTubeClient::new(&config.youtube));
        Ok(Self::assemble(config, platform, store))
    }

    /// Wires the services around an already opened store and any platform
    /// implementation. Used by `new` and by tests with a scripted platform.
    #[must_use]
    pub fn with_platform(
        config: Config,
        platform: Arc<dyn VideoPlatform>,
        store: Arc<Store>,
    ) -> Self {
        Self::assemble(config, platform, store)
    }

    fn assemble(config: Config, platform: Arc<dyn VideoPlatform>, store: Arc<Store>) -> Self {
        let cache = ResponseCache::new(config.cache.clone());

        let remote = RemoteFetcher::new(
            platform,
            &config.youtube,
            &config.retry,
            &config.concurrency,
        );
        let fetcher = Arc::new(CachedFetcher::new(Arc::new(remote), cache.clone()));

        let history = Arc::new(HistoryExporter::new(store.clone()));

        let orchestrator = Arc::new(SearchOrchestrator::new(
            fetcher,
            store.clone(),
            Arc::new(ExtractiveSummarizer::new(config.summarizer.clone())),
            Arc::new(KeywordTopicLabeler),
            history.clone(),
            SearchSettings::from(&config),
        ));

        let channels = Arc::new(ChannelAnalyzer::new(
            store.clone(),
            config.analysis.max_channel_topics,
        ));
        let trends = Arc::new(TrendAggregator::new(store.clone()));
        let maintenance = Maintenance::new(store.clone(), cache.clone());

        Self {
            config: Arc::new(RwLock::new(config)),
            store,
            cache,
            orchestrator,
            history,
            channels,
            trends,
            maintenance,
        }
    }
}
