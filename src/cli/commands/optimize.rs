use std::sync::Arc;

use crate::config::Config;
use crate::db::{Store, VideoStore};
use crate::services::{Maintenance, ResponseCache};

pub async fn cmd_optimize(config: &Config) -> anyhow::Result<()> {
    let store = Arc::new(Store::from_config(config).await?);
    let maintenance = Maintenance::new(store, ResponseCache::new(config.cache.clone()));

    println!("Running maintenance...");
    let report = maintenance.run_now().await?;

    println!("✓ Maintenance complete");
    println!("  Pruned videos:   {}", report.pruned_videos);
    println!("  Pruned searches: {}", report.pruned_searches);
    Ok(())
}

pub async fn cmd_stats(config: &Config) -> anyhow::Result<()> {
    let store = Store::from_config(config).await?;
    let counts = store.counts().await?;

    println!("Database: {}", config.general.database_path);
    println!("  Videos:   {} (retention cap {})", counts.videos, config.store.max_videos_retained);
    println!("  Searches: {}", counts.searches);
    Ok(())
}
