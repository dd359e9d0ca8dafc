use crate::db::{StoreError, VideoStore};
use crate::domain::{StatSample, TrendPoint, VideoId};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Dated view-count series for a topic, built from stored stats samples.
pub struct TrendAggregator {
    store: Arc<dyn VideoStore>,
}

impl TrendAggregator {
    #[must_use]
    pub fn new(store: Arc<dyn VideoStore>) -> Self {
        Self { store }
    }

    pub async fn trend(&self, topic: &str) -> Result<Vec<TrendPoint>, StoreError> {
        let samples = self.store.samples_for_topic(topic).await?;
        Ok(bucket_by_date(&samples))
    }
}

/// One point per date with at least one sample, ascending, no gap filling.
///
/// A video sampled several times on one day counts once, with its highest
/// observed view count for that day.
fn bucket_by_date(samples: &[StatSample]) -> Vec<TrendPoint> {
    let mut per_video: HashMap<(NaiveDate, &VideoId), u64> = HashMap::new();
    for sample in samples {
        let slot = per_video
            .entry((sample.fetched_at.date_naive(), &sample.video_id))
            .or_insert(0);
        *slot = (*slot).max(sample.view_count);
    }

    let mut per_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for ((date, _), views) in per_video {
        *per_date.entry(date).or_insert(0) += views;
    }

    per_date
        .into_iter()
        .map(|(date, views)| TrendPoint { date, views })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(id: &str, day: u32, hour: u32, views: u64) -> StatSample {
        StatSample {
            video_id: VideoId::new(id),
            fetched_at: Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap(),
            view_count: views,
        }
    }

    #[test]
    fn sums_per_date_in_ascending_order() {
        let samples = vec![
            sample("b", 3, 9, 40),
            sample("a", 1, 9, 100),
            sample("b", 1, 10, 50),
            sample("a", 3, 8, 120),
        ];

        let points = bucket_by_date(&samples);

        assert_eq!(
            points,
            vec![
                TrendPoint {
                    date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                    views: 150,
                },
                TrendPoint {
                    date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                    views: 160,
                },
            ]
        );
    }

    #[test]
    fn repeated_samples_on_one_day_count_once() {
        let samples = vec![sample("a", 2, 8, 10), sample("a", 2, 20, 15)];
        let points = bucket_by_date(&samples);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].views, 15);
    }

    #[test]
    fn no_samples_means_no_points() {
        assert!(bucket_by_date(&[]).is_empty());
    }
}
