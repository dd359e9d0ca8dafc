//! Scripted platform double with call counting, shared by service tests.

use crate::clients::{FetchError, VideoPlatform};
use crate::domain::{ChannelId, VideoDetails, VideoId};
use chrono::{TimeZone, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct FakePlatform {
    videos: Vec<VideoDetails>,
    failing_id: Option<VideoId>,
    details_error: Option<FetchError>,
    search_error: Option<FetchError>,
    latency: Duration,
    search_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    transcript_calls: AtomicUsize,
    batches: Mutex<Vec<usize>>,
}

pub fn sample_details(index: usize) -> VideoDetails {
    VideoDetails {
        video_id: VideoId::new(format!("vid{index:02}")),
        title: format!("Video number {index}"),
        description: format!(
            "Artificial intelligence ethics is discussed in episode {index}. \
             Researchers explain how machine learning systems affect society."
        ),
        channel_id: ChannelId::new("UCtest"),
        channel: "Test Channel".to_string(),
        published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
        duration_seconds: 600,
        view_count: (index as u64) * 100,
        like_count: index as u64,
    }
}

impl FakePlatform {
    pub fn with_videos(count: usize) -> Self {
        Self {
            videos: (1..=count).map(sample_details).collect(),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.failing_id = Some(VideoId::new(id));
        self
    }

    pub fn failing_details_with(mut self, err: FetchError) -> Self {
        self.details_error = Some(err);
        self
    }

    pub fn failing_search_with(mut self, err: FetchError) -> Self {
        self.search_error = Some(err);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn ids(&self) -> Vec<VideoId> {
        self.videos.iter().map(|v| v.video_id.clone()).collect()
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn transcript_calls(&self) -> usize {
        self.transcript_calls.load(Ordering::SeqCst)
    }

    pub fn detail_batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait::async_trait]
impl VideoPlatform for FakePlatform {
    async fn search(&self, _query: &str, max_results: u32) -> Result<Vec<VideoId>, FetchError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Some(err) = &self.search_error {
            return Err(err.clone());
        }
        Ok(self.ids().into_iter().take(max_results as usize).collect())
    }

    async fn video_details(&self, ids: &[VideoId]) -> Result<Vec<VideoDetails>, FetchError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(ids.len());
        self.pause().await;

        if let Some(err) = &self.details_error {
            return Err(err.clone());
        }
        if self.failing_id.as_ref().is_some_and(|f| ids.contains(f)) {
            return Err(FetchError::Transient("connection reset".to_string()));
        }

        // Reverse order so callers must restore the ranking themselves.
        Ok(self
            .videos
            .iter()
            .rev()
            .filter(|v| ids.contains(&v.video_id))
            .cloned()
            .collect())
    }

    async fn transcript(&self, id: &VideoId) -> Result<String, FetchError> {
        self.transcript_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("This transcript belongs to {id}. Ethics matter in every model."))
    }
}
