use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Videos::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Videos::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Videos::VideoId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Videos::Title).string().not_null())
                    .col(ColumnDef::new(Videos::ChannelId).string().not_null())
                    .col(ColumnDef::new(Videos::Channel).string().not_null())
                    .col(ColumnDef::new(Videos::PublishedAt).string())
                    .col(
                        ColumnDef::new(Videos::DurationSeconds)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Videos::ViewCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Videos::LikeCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Videos::Url).string().not_null())
                    .col(ColumnDef::new(Videos::Summary).text().not_null())
                    .col(
                        ColumnDef::new(Videos::TalkingPoints)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(
                        ColumnDef::new(Videos::Topics)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(Videos::FetchedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_videos_channel_id")
                    .table(Videos::Table)
                    .col(Videos::ChannelId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(VideoStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VideoStats::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VideoStats::VideoId).string().not_null())
                    .col(ColumnDef::new(VideoStats::FetchedAt).string().not_null())
                    .col(
                        ColumnDef::new(VideoStats::ViewCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(VideoStats::LikeCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_video_stats_video_id")
                    .table(VideoStats::Table)
                    .col(VideoStats::VideoId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SearchHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SearchHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SearchHistory::Query).string().not_null())
                    .col(
                        ColumnDef::new(SearchHistory::VideoIds)
                            .text()
                            .not_null()
                            .default("[]"),
                    )
                    .col(ColumnDef::new(SearchHistory::CreatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SearchHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VideoStats::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Videos::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Videos {
    Table,
    Id,
    VideoId,
    Title,
    ChannelId,
    Channel,
    PublishedAt,
    DurationSeconds,
    ViewCount,
    LikeCount,
    Url,
    Summary,
    TalkingPoints,
    Topics,
    FetchedAt,
}

#[derive(DeriveIden)]
enum VideoStats {
    Table,
    Id,
    VideoId,
    FetchedAt,
    ViewCount,
    LikeCount,
}

#[derive(DeriveIden)]
enum SearchHistory {
    Table,
    Id,
    Query,
    VideoIds,
    CreatedAt,
}
