//! Domain types for video discovery with strong typing.
//!
//! Identifiers are newtypes so a channel id can never be passed where a video
//! id is expected. Records are plain serde structs shared by the fetch path,
//! the store and the HTTP layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-unique identifier of a video.
///
/// # Examples
///
/// ```rust
/// use topicscout::domain::VideoId;
///
/// let id = VideoId::new("dQw4w9WgXcQ");
/// assert_eq!(id.as_str(), "dQw4w9WgXcQ");
/// assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this video.
    #[must_use]
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for VideoId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a channel on the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic identifier of a recorded search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchId(i64);

impl SearchId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SearchId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Raw per-video payload as returned by the remote details call, before
/// summarization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub video_id: VideoId,
    pub title: String,
    pub description: String,
    pub channel_id: ChannelId,
    pub channel: String,
    pub published_at: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
    pub view_count: u64,
    pub like_count: u64,
}

/// A fetched, summarized and (usually) persisted video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub video_id: VideoId,
    pub title: String,
    pub channel_id: ChannelId,
    pub channel: String,
    pub published_at: Option<DateTime<Utc>>,
    pub duration_seconds: u64,
    pub view_count: u64,
    pub like_count: u64,
    pub url: String,
    pub summary: String,
    pub talking_points: Vec<String>,
    pub topics: Vec<String>,
}

impl VideoRecord {
    /// Combines remote details with the summarizer output.
    #[must_use]
    pub fn from_details(
        details: VideoDetails,
        summary: String,
        talking_points: Vec<String>,
        topics: Vec<String>,
    ) -> Self {
        let url = details.video_id.watch_url();
        Self {
            video_id: details.video_id,
            title: details.title,
            channel_id: details.channel_id,
            channel: details.channel,
            published_at: details.published_at,
            duration_seconds: details.duration_seconds,
            view_count: details.view_count,
            like_count: details.like_count,
            url,
            summary,
            talking_points,
            topics,
        }
    }
}

/// One recorded orchestrated search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub search_id: SearchId,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub video_ids: Vec<VideoId>,
}

/// A single historical view-count observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatSample {
    pub video_id: VideoId,
    pub fetched_at: DateTime<Utc>,
    pub view_count: u64,
}

/// One dated point of a topic trend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub views: u64,
}

/// A stored video as exposed in a channel's most-viewed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewedVideo {
    pub title: String,
    pub url: String,
    pub view_count: u64,
}

/// Aggregated statistics for one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelAnalysis {
    pub most_common_topics: Vec<String>,
    pub average_video_length_seconds: f64,
    pub most_viewed_videos: Vec<ViewedVideo>,
}

impl ChannelAnalysis {
    /// Well-formed result for a channel with no stored videos.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            most_common_topics: Vec::new(),
            average_video_length_seconds: 0.0,
            most_viewed_videos: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_serializes_as_plain_string() {
        let id = VideoId::new("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
        let back: VideoId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn record_from_details_builds_watch_url() {
        let details = VideoDetails {
            video_id: VideoId::new("xyz"),
            title: "Title".to_string(),
            description: String::new(),
            channel_id: ChannelId::new("UC1"),
            channel: "Channel".to_string(),
            published_at: None,
            duration_seconds: 60,
            view_count: 5,
            like_count: 1,
        };

        let record = VideoRecord::from_details(details, "s".to_string(), vec![], vec![]);
        assert_eq!(record.url, "https://www.youtube.com/watch?v=xyz");
        assert_eq!(record.view_count, 5);
    }

    #[test]
    fn history_entry_hides_video_ids_in_json() {
        let entry = HistoryEntry {
            search_id: SearchId::new(7),
            query: "rust".to_string(),
            timestamp: Utc::now(),
            video_ids: vec![VideoId::new("a")],
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["search_id"], 7);
        assert!(json.get("video_ids").is_none());
    }
}
