use super::{FetchError, VideoPlatform};
use crate::config::YouTubeConfig;
use crate::domain::{ChannelId, VideoDetails, VideoId};
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: Snippet,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "channelId", default)]
    channel_id: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

/// Counts arrive as decimal strings.
#[derive(Debug, Deserialize)]
struct Statistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
    #[serde(rename = "likeCount")]
    like_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct TimedText {
    #[serde(rename = "text", default)]
    lines: Vec<TimedLine>,
}

#[derive(Debug, Deserialize)]
struct TimedLine {
    #[serde(rename = "$text", default)]
    content: String,
}

/// YouTube Data API v3 plus the public timed-text endpoint.
#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: String,
    transcript_url: String,
    transcript_language: String,
    fetch_transcripts: bool,
}

impl YouTubeClient {
    #[must_use]
    pub fn new(config: &YouTubeConfig) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("TopicScout/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            transcript_url: config.transcript_url.clone(),
            transcript_language: config.transcript_language.clone(),
            fetch_transcripts: config.fetch_transcripts,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url))
            .map_err(|e| FetchError::InvalidRequest(format!("bad base url: {e}")))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait::async_trait]
impl VideoPlatform for YouTubeClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<VideoId>, FetchError> {
        let mut url = self.endpoint("search")?;
        url.query_pairs_mut()
            .append_pair("part", "snippet")
            .append_pair("type", "video")
            .append_pair("maxResults", &max_results.to_string())
            .append_pair("q", query);

        debug!(event = "youtube_search", query = %query, max_results);

        let response: SearchResponse = self.get_json(url).await?;

        let mut ids: Vec<VideoId> = Vec::with_capacity(response.items.len());
        for id in response.items.into_iter().filter_map(|i| i.id.video_id) {
            let id = VideoId::new(id);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn video_details(&self, ids: &[VideoId]) -> Result<Vec<VideoDetails>, FetchError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let joined = ids.iter().map(VideoId::as_str).collect::<Vec<_>>().join(",");
        let mut url = self.endpoint("videos")?;
        url.query_pairs_mut()
            .append_pair("part", "snippet,contentDetails,statistics")
            .append_pair("id", &joined);

        debug!(event = "youtube_videos", count = ids.len());

        let response: VideosResponse = self.get_json(url).await?;
        Ok(response.items.into_iter().map(into_details).collect())
    }

    async fn transcript(&self, id: &VideoId) -> Result<String, FetchError> {
        if !self.fetch_transcripts {
            return Ok(String::new());
        }

        let mut url = Url::parse(&self.transcript_url)
            .map_err(|e| FetchError::InvalidRequest(format!("bad transcript url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("lang", &self.transcript_language)
            .append_pair("v", id.as_str());

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(String::new());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let body = response.text().await?;
        Ok(parse_transcript(&body))
    }
}

fn into_details(item: VideoItem) -> VideoDetails {
    let parse_count = |value: Option<&String>| -> u64 {
        value.and_then(|v| v.parse().ok()).unwrap_or(0)
    };

    VideoDetails {
        video_id: VideoId::new(item.id),
        title: html_escape::decode_html_entities(&item.snippet.title).to_string(),
        description: item.snippet.description,
        channel_id: ChannelId::new(item.snippet.channel_id),
        channel: html_escape::decode_html_entities(&item.snippet.channel_title).to_string(),
        published_at: item.snippet.published_at,
        duration_seconds: item
            .content_details
            .map_or(0, |d| parse_iso8601_duration(&d.duration)),
        view_count: parse_count(item.statistics.as_ref().and_then(|s| s.view_count.as_ref())),
        like_count: parse_count(item.statistics.as_ref().and_then(|s| s.like_count.as_ref())),
    }
}

/// Maps an unsuccessful response to the error taxonomy.
///
/// The Data API signals quota exhaustion with a 403 whose `reason` is
/// `quotaExceeded` or `dailyLimitExceeded`; short-term throttling uses
/// `rateLimitExceeded` or a plain 429.
fn classify_error(status: StatusCode, body: &str) -> FetchError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let reason = parsed
        .as_ref()
        .and_then(|e| e.error.errors.first())
        .map(|r| r.reason.as_str())
        .unwrap_or_default();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.to_string());

    match reason {
        "quotaExceeded" | "dailyLimitExceeded" => FetchError::QuotaExceeded(message),
        "rateLimitExceeded" | "userRateLimitExceeded" => FetchError::RateLimited(message),
        _ if status == StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited(message),
        _ if status.is_server_error() => FetchError::Transient(message),
        _ => FetchError::InvalidRequest(message),
    }
}

fn parse_transcript(xml: &str) -> String {
    if xml.trim().is_empty() {
        return String::new();
    }

    let parsed: TimedText = quick_xml::de::from_str(xml).unwrap_or_default();
    parsed
        .lines
        .iter()
        .map(|line| html_escape::decode_html_entities(line.content.trim()).to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$")
            .expect("Invalid regex pattern defined in code")
    })
}

/// Parses `PT1H2M3S` style durations into seconds. Unparseable input is 0.
fn parse_iso8601_duration(value: &str) -> u64 {
    let Some(caps) = duration_re().captures(value) else {
        return 0;
    };

    // Digit runs too long for u64 saturate rather than read as zero.
    let part = |i: usize, unit: u64| -> u64 {
        caps.get(i)
            .map_or(0, |m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
            .saturating_mul(unit)
    };

    part(1, 86_400)
        .saturating_add(part(2, 3600))
        .saturating_add(part(3, 60))
        .saturating_add(part(4, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations() {
        assert_eq!(parse_iso8601_duration("PT10M"), 600);
        assert_eq!(parse_iso8601_duration("PT1H2M3S"), 3723);
        assert_eq!(parse_iso8601_duration("P1DT1S"), 86_401);
        assert_eq!(parse_iso8601_duration("PT45S"), 45);
        assert_eq!(parse_iso8601_duration("garbage"), 0);
    }

    #[test]
    fn oversized_durations_saturate() {
        assert_eq!(parse_iso8601_duration("P213503982334602DT1S"), u64::MAX);
        assert_eq!(parse_iso8601_duration("PT99999999999999999999999S"), u64::MAX);
        assert_eq!(parse_iso8601_duration("P1DT18446744073709551615S"), u64::MAX);
    }

    #[test]
    fn classifies_quota_and_rate_limits() {
        let quota = r#"{"error":{"message":"The request cannot be completed because you have exceeded your quota.","errors":[{"reason":"quotaExceeded"}]}}"#;
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, quota),
            FetchError::QuotaExceeded(_)
        ));

        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, ""),
            FetchError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_GATEWAY, "oops"),
            FetchError::Transient(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, "{}"),
            FetchError::InvalidRequest(_)
        ));
    }

    #[test]
    fn transcript_lines_are_joined_and_unescaped() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0.5" dur="2.1">Hello &amp;amp; welcome</text><text start="2.6" dur="1.0">to the show</text></transcript>"#;
        assert_eq!(parse_transcript(xml), "Hello & welcome to the show");
        assert_eq!(parse_transcript(""), "");
    }

    #[test]
    fn video_item_maps_statistics() {
        let json = r#"{
            "id": "abc",
            "snippet": {
                "title": "Rust &amp; You",
                "description": "desc",
                "channelId": "UC1",
                "channelTitle": "Chan",
                "publishedAt": "2024-03-01T12:00:00Z"
            },
            "contentDetails": { "duration": "PT20M" },
            "statistics": { "viewCount": "1234", "likeCount": "56" }
        }"#;
        let item: VideoItem = serde_json::from_str(json).unwrap();
        let details = into_details(item);
        assert_eq!(details.title, "Rust & You");
        assert_eq!(details.duration_seconds, 1200);
        assert_eq!(details.view_count, 1234);
        assert_eq!(details.like_count, 56);
        assert_eq!(details.channel_id.as_str(), "UC1");
    }
}
