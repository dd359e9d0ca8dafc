use crate::db::{StoreError, VideoStore};
use crate::domain::{ChannelAnalysis, ChannelId, VideoRecord, ViewedVideo};
use crate::text;
use std::sync::Arc;

/// Per-channel aggregates computed from stored videos only.
pub struct ChannelAnalyzer {
    store: Arc<dyn VideoStore>,
    max_topics: usize,
}

impl ChannelAnalyzer {
    #[must_use]
    pub fn new(store: Arc<dyn VideoStore>, max_topics: usize) -> Self {
        Self { store, max_topics }
    }

    pub async fn analyze(&self, channel: &ChannelId) -> Result<ChannelAnalysis, StoreError> {
        let videos = self.store.videos_for_channel(channel).await?;
        Ok(aggregate(&videos, self.max_topics))
    }
}

fn aggregate(videos: &[VideoRecord], max_topics: usize) -> ChannelAnalysis {
    if videos.is_empty() {
        return ChannelAnalysis::empty();
    }

    let most_common_topics =
        text::rank_by_frequency(videos.iter().flat_map(|v| v.topics.iter().cloned()))
            .into_iter()
            .take(max_topics)
            .map(|(topic, _)| topic)
            .collect();

    let total: u64 = videos.iter().map(|v| v.duration_seconds).sum();
    let average_video_length_seconds = total as f64 / videos.len() as f64;

    let mut most_viewed_videos: Vec<ViewedVideo> = videos
        .iter()
        .map(|v| ViewedVideo {
            title: v.title.clone(),
            url: v.url.clone(),
            view_count: v.view_count,
        })
        .collect();
    most_viewed_videos.sort_by(|a, b| b.view_count.cmp(&a.view_count));

    ChannelAnalysis {
        most_common_topics,
        average_video_length_seconds,
        most_viewed_videos,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VideoId;

    fn video(id: &str, duration: u64, views: u64, topics: &[&str]) -> VideoRecord {
        VideoRecord {
            video_id: VideoId::new(id),
            title: format!("Title {id}"),
            channel_id: ChannelId::new("UC1"),
            channel: "Channel".to_string(),
            published_at: None,
            duration_seconds: duration,
            view_count: views,
            like_count: 0,
            url: VideoId::new(id).watch_url(),
            summary: String::new(),
            talking_points: vec![],
            topics: topics.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    #[test]
    fn average_duration_of_three_videos() {
        let videos = vec![
            video("a", 600, 10, &[]),
            video("b", 1200, 30, &[]),
            video("c", 1800, 20, &[]),
        ];
        let analysis = aggregate(&videos, 10);
        assert!((analysis.average_video_length_seconds - 1200.0).abs() < f64::EPSILON);

        let views: Vec<u64> = analysis
            .most_viewed_videos
            .iter()
            .map(|v| v.view_count)
            .collect();
        assert_eq!(views, vec![30, 20, 10]);
    }

    #[test]
    fn topics_rank_by_frequency_then_first_seen() {
        let videos = vec![
            video("a", 60, 1, &["rust", "async"]),
            video("b", 60, 1, &["tokio", "async"]),
            video("c", 60, 1, &["rust", "wasm"]),
        ];
        let analysis = aggregate(&videos, 3);
        assert_eq!(analysis.most_common_topics, vec!["rust", "async", "tokio"]);
    }

    #[test]
    fn empty_channel_is_well_formed() {
        let analysis = aggregate(&[], 10);
        assert_eq!(analysis, ChannelAnalysis::empty());
        assert!(analysis.most_viewed_videos.is_empty());
    }
}
