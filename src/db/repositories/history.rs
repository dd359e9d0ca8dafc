use crate::domain::{HistoryEntry, SearchId, VideoId};
use crate::entities::{prelude::*, search_history};
use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryOrder,
    QuerySelect, Set,
};

pub struct HistoryRepository {
    conn: DatabaseConnection,
}

impl HistoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn record(
        &self,
        query: &str,
        video_ids: &[VideoId],
        at: DateTime<Utc>,
    ) -> Result<SearchId, DbErr> {
        let ids_json = serde_json::to_string(video_ids)
            .map_err(|e| DbErr::Custom(format!("encode history ids: {e}")))?;

        let active_model = search_history::ActiveModel {
            query: Set(query.to_string()),
            video_ids: Set(ids_json),
            created_at: Set(at.to_rfc3339()),
            ..Default::default()
        };

        let result = SearchHistory::insert(active_model).exec(&self.conn).await?;
        Ok(SearchId::new(result.last_insert_id))
    }

    /// Most recent first.
    pub async fn list(&self, limit: u64) -> Result<Vec<HistoryEntry>, DbErr> {
        let rows = SearchHistory::find()
            .order_by_desc(search_history::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(into_entry).collect())
    }

    pub async fn get(&self, id: SearchId) -> Result<Option<HistoryEntry>, DbErr> {
        let row = SearchHistory::find_by_id(id.value()).one(&self.conn).await?;
        Ok(row.map(into_entry))
    }

    pub async fn count(&self) -> Result<u64, DbErr> {
        SearchHistory::find().count(&self.conn).await
    }

    /// Deletes searches none of whose videos are still stored. Searches that
    /// returned nothing have nothing to lose and are kept.
    pub async fn prune_orphans(&self) -> Result<u64, DbErr> {
        let result = self
            .conn
            .execute_unprepared(
                "DELETE FROM search_history \
                 WHERE json_array_length(search_history.video_ids) > 0 \
                 AND NOT EXISTS ( \
                 SELECT 1 FROM json_each(search_history.video_ids) j \
                 JOIN videos v ON v.video_id = j.value)",
            )
            .await?;
        Ok(result.rows_affected())
    }
}

fn into_entry(model: search_history::Model) -> HistoryEntry {
    HistoryEntry {
        search_id: SearchId::new(model.id),
        query: model.query,
        timestamp: DateTime::parse_from_rfc3339(&model.created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(DateTime::UNIX_EPOCH),
        video_ids: serde_json::from_str(&model.video_ids).unwrap_or_default(),
    }
}
