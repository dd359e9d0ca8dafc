//! Search history and portable reports of past searches.

use crate::db::{StoreError, VideoStore};
use crate::domain::{HistoryEntry, SearchId, VideoId, VideoRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Search {0} not found")]
    NotFound(SearchId),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to encode report: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Text,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Text => "text/plain; charset=utf-8",
            Self::Json => "application/json",
        }
    }

    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub filename: String,
    pub format: ExportFormat,
    pub body: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    query: &'a str,
    timestamp: String,
    results: Vec<JsonReportItem<'a>>,
}

#[derive(Serialize)]
struct JsonReportItem<'a> {
    title: &'a str,
    channel: &'a str,
    url: &'a str,
    summary: &'a str,
    talking_points: &'a [String],
}

pub struct HistoryExporter {
    store: Arc<dyn VideoStore>,
}

impl HistoryExporter {
    #[must_use]
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, query: &str, ids: &[VideoId]) -> Result<SearchId, HistoryError> {
        Ok(self.store.record_search(query, ids).await?)
    }

    pub async fn list(&self, limit: u64) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self.store.list_history(limit).await?)
    }

    pub async fn get(&self, id: SearchId) -> Result<HistoryEntry, HistoryError> {
        self.store
            .get_history(id)
            .await?
            .ok_or(HistoryError::NotFound(id))
    }

    /// Renders a recorded search. Videos pruned since the search are skipped;
    /// the rest keep the order the search returned them in.
    pub async fn export(&self, id: SearchId, format: ExportFormat) -> Result<Report, HistoryError> {
        let entry = self.get(id).await?;
        let stored = self.store.get_videos(&entry.video_ids).await?;

        let mut by_id: HashMap<VideoId, VideoRecord> = stored
            .into_iter()
            .map(|s| (s.record.video_id.clone(), s.record))
            .collect();
        let videos: Vec<VideoRecord> = entry
            .video_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect();

        let body = match format {
            ExportFormat::Text => render_text(&entry, &videos),
            ExportFormat::Json => render_json(&entry, &videos)?,
        };

        Ok(Report {
            filename: format!(
                "{}_{}.{}",
                entry.timestamp.format("%Y%m%d_%H%M%S"),
                slugify(&entry.query),
                format.extension()
            ),
            format,
            body,
        })
    }
}

fn render_text(entry: &HistoryEntry, videos: &[VideoRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Topic-Scout export");
    let _ = writeln!(out, "Query: {}", entry.query);
    let _ = writeln!(out, "Searched: {}", entry.timestamp.to_rfc3339());
    let _ = writeln!(out, "Results: {}", videos.len());

    for (index, video) in videos.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}. {}", index + 1, video.title);
        let _ = writeln!(out, "   URL: {}", video.url);
        let _ = writeln!(out, "   Summary: {}", video.summary);
        if !video.talking_points.is_empty() {
            let _ = writeln!(out, "   Talking points: {}", video.talking_points.join("; "));
        }
    }

    out
}

fn render_json(entry: &HistoryEntry, videos: &[VideoRecord]) -> Result<String, HistoryError> {
    let report = JsonReport {
        query: &entry.query,
        timestamp: entry.timestamp.to_rfc3339(),
        results: videos
            .iter()
            .map(|v| JsonReportItem {
                title: &v.title,
                channel: &v.channel,
                url: &v.url,
                summary: &v.summary,
                talking_points: &v.talking_points,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&report).map_err(|e| HistoryError::Encode(e.to_string()))
}

/// Lower-case, dash-separated, at most 50 characters.
fn slugify(query: &str) -> String {
    let mut slug = String::new();
    for c in query.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_end_matches('-').chars().take(50).collect();
    if slug.is_empty() {
        "search".to_string()
    } else {
        slug
    }
}
