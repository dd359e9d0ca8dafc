use crate::domain::{ChannelId, StatSample, VideoId, VideoRecord};
use crate::entities::{prelude::*, video_stats, videos};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};

/// A stored video together with the time it was last fetched remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVideo {
    pub record: VideoRecord,
    pub fetched_at: DateTime<Utc>,
}

pub struct VideoRepository {
    conn: DatabaseConnection,
}

impl VideoRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Inserts or updates by `video_id`, keeps the full-text row in step and
    /// appends a stats sample, all in one transaction.
    pub async fn upsert(&self, record: &VideoRecord, fetched_at: DateTime<Utc>) -> Result<(), DbErr> {
        let fetched_at = fetched_at.to_rfc3339();
        let txn = self.conn.begin().await?;

        let active_model = videos::ActiveModel {
            video_id: Set(record.video_id.as_str().to_string()),
            title: Set(record.title.clone()),
            channel_id: Set(record.channel_id.as_str().to_string()),
            channel: Set(record.channel.clone()),
            published_at: Set(record.published_at.map(|t| t.to_rfc3339())),
            duration_seconds: Set(to_i64(record.duration_seconds)),
            view_count: Set(to_i64(record.view_count)),
            like_count: Set(to_i64(record.like_count)),
            url: Set(record.url.clone()),
            summary: Set(record.summary.clone()),
            talking_points: Set(encode_list(&record.talking_points)),
            topics: Set(encode_list(&record.topics)),
            fetched_at: Set(fetched_at.clone()),
            ..Default::default()
        };

        Videos::insert(active_model)
            .on_conflict(
                OnConflict::column(videos::Column::VideoId)
                    .update_columns([
                        videos::Column::Title,
                        videos::Column::ChannelId,
                        videos::Column::Channel,
                        videos::Column::PublishedAt,
                        videos::Column::DurationSeconds,
                        videos::Column::ViewCount,
                        videos::Column::LikeCount,
                        videos::Column::Url,
                        videos::Column::Summary,
                        videos::Column::TalkingPoints,
                        videos::Column::Topics,
                        videos::Column::FetchedAt,
                    ])
                    .to_owned(),
            )
            .exec(&txn)
            .await?;

        txn.execute(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "DELETE FROM videos_fts WHERE video_id = ?",
            [record.video_id.as_str().into()],
        ))
        .await?;

        txn.execute(Statement::from_sql_and_values(
            DbBackend::Sqlite,
            "INSERT INTO videos_fts (video_id, title, summary) VALUES (?, ?, ?)",
            [
                record.video_id.as_str().into(),
                record.title.as_str().into(),
                record.summary.as_str().into(),
            ],
        ))
        .await?;

        let sample = video_stats::ActiveModel {
            video_id: Set(record.video_id.as_str().to_string()),
            fetched_at: Set(fetched_at),
            view_count: Set(to_i64(record.view_count)),
            like_count: Set(to_i64(record.like_count)),
            ..Default::default()
        };
        VideoStats::insert(sample).exec(&txn).await?;

        txn.commit().await
    }

    pub async fn get_many(&self, ids: &[VideoId]) -> Result<Vec<StoredVideo>, DbErr> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let rows = Videos::find()
            .filter(videos::Column::VideoId.is_in(ids.iter().map(VideoId::as_str)))
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(into_stored).collect())
    }

    /// Full-text match over title and summary, best `bm25` first and ties
    /// broken by view count.
    pub async fn search_text(&self, query: &str, limit: u64) -> Result<Vec<VideoRecord>, DbErr> {
        let Some(expression) = fts_expression(query) else {
            return Ok(vec![]);
        };

        let rows = Videos::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "SELECT v.* FROM videos_fts f \
                 JOIN videos v ON v.video_id = f.video_id \
                 WHERE videos_fts MATCH ? \
                 ORDER BY bm25(videos_fts), v.view_count DESC \
                 LIMIT ?",
                [expression.into(), to_i64(limit).into()],
            ))
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(|m| into_stored(m).record).collect())
    }

    pub async fn for_channel(&self, channel_id: &ChannelId) -> Result<Vec<VideoRecord>, DbErr> {
        let rows = Videos::find()
            .filter(videos::Column::ChannelId.eq(channel_id.as_str()))
            .order_by_asc(videos::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(|m| into_stored(m).record).collect())
    }

    /// Every stats sample of the videos matching `topic`, oldest first.
    pub async fn samples_for_topic(&self, topic: &str) -> Result<Vec<StatSample>, DbErr> {
        let Some(expression) = fts_expression(topic) else {
            return Ok(vec![]);
        };

        let rows = VideoStats::find()
            .from_raw_sql(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "SELECT s.* FROM video_stats s \
                 WHERE s.video_id IN (SELECT video_id FROM videos_fts WHERE videos_fts MATCH ?) \
                 ORDER BY s.fetched_at, s.id",
                [expression.into()],
            ))
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let fetched_at = parse_timestamp(&row.fetched_at)?;
                Some(StatSample {
                    video_id: VideoId::new(row.video_id),
                    fetched_at,
                    view_count: u64::try_from(row.view_count).unwrap_or(0),
                })
            })
            .collect())
    }

    pub async fn count(&self) -> Result<u64, DbErr> {
        Videos::find().count(&self.conn).await
    }

    /// Keeps the `keep` most recently inserted videos and drops everything
    /// else, including their index rows and stats.
    pub async fn prune(&self, keep: u64) -> Result<u64, DbErr> {
        let txn = self.conn.begin().await?;

        let deleted = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                "DELETE FROM videos WHERE id NOT IN \
                 (SELECT id FROM videos ORDER BY id DESC LIMIT ?)",
                [to_i64(keep).into()],
            ))
            .await?
            .rows_affected();

        txn.execute_unprepared(
            "DELETE FROM videos_fts WHERE video_id NOT IN (SELECT video_id FROM videos)",
        )
        .await?;
        txn.execute_unprepared(
            "DELETE FROM video_stats WHERE video_id NOT IN (SELECT video_id FROM videos)",
        )
        .await?;

        txn.commit().await?;
        Ok(deleted)
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn decode_list(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn into_stored(model: videos::Model) -> StoredVideo {
    let fetched_at = parse_timestamp(&model.fetched_at).unwrap_or(DateTime::UNIX_EPOCH);
    StoredVideo {
        record: VideoRecord {
            video_id: VideoId::new(model.video_id),
            title: model.title,
            channel_id: ChannelId::new(model.channel_id),
            channel: model.channel,
            published_at: model.published_at.as_deref().and_then(parse_timestamp),
            duration_seconds: u64::try_from(model.duration_seconds).unwrap_or(0),
            view_count: u64::try_from(model.view_count).unwrap_or(0),
            like_count: u64::try_from(model.like_count).unwrap_or(0),
            url: model.url,
            summary: model.summary,
            talking_points: decode_list(&model.talking_points),
            topics: decode_list(&model.topics),
        },
        fetched_at,
    }
}

/// Turns free text into an FTS5 expression of quoted terms, so user input
/// can never be parsed as query syntax.
fn fts_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}
