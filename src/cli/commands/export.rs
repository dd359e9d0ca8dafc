use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::config::Config;
use crate::db::Store;
use crate::domain::SearchId;
use crate::services::{ExportFormat, HistoryExporter};

pub async fn cmd_export(
    config: &Config,
    search_id: i64,
    format: &str,
    output: Option<&str>,
) -> anyhow::Result<()> {
    let format = match format.to_lowercase().as_str() {
        "text" | "txt" => ExportFormat::Text,
        "json" => ExportFormat::Json,
        other => anyhow::bail!("Unknown export format '{other}', use text or json"),
    };

    let store = Arc::new(Store::from_config(config).await?);
    let report = HistoryExporter::new(store)
        .export(SearchId::new(search_id), format)
        .await?;

    let path = output.map_or_else(|| PathBuf::from(&report.filename), PathBuf::from);
    tokio::fs::write(&path, report.body)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    println!("✓ Exported search {search_id} to {}", path.display());
    Ok(())
}
