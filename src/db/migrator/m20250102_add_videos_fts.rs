use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Full-text index over title and summary. Rows are kept in step with
/// `videos` by the repository, keyed on the unindexed `video_id` column.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE VIRTUAL TABLE IF NOT EXISTS videos_fts \
             USING fts5(video_id UNINDEXED, title, summary)",
        )
        .await?;

        db.execute_unprepared(
            "INSERT INTO videos_fts (video_id, title, summary) \
             SELECT video_id, title, summary FROM videos",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS videos_fts")
            .await?;
        Ok(())
    }
}
