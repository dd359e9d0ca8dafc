use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::services::HistoryExporter;

pub async fn cmd_history(config: &Config, limit: u64) -> anyhow::Result<()> {
    let store = Arc::new(Store::from_config(config).await?);
    let entries = HistoryExporter::new(store).list(limit).await?;

    if entries.is_empty() {
        println!("No search history.");
        return Ok(());
    }

    println!("Recent Searches (last {}):", entries.len());
    println!("{:-<70}", "");

    for entry in entries {
        println!(
            "• [{}] {} ({} videos)",
            entry.search_id,
            entry.query,
            entry.video_ids.len()
        );
        println!("  {}", entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}
