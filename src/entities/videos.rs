use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "videos")]
pub struct Model {
    /// Insertion order; retention prunes the lowest ids first.
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub video_id: String,
    pub title: String,
    pub channel_id: String,
    pub channel: String,
    pub published_at: Option<String>,
    pub duration_seconds: i64,
    pub view_count: i64,
    pub like_count: i64,
    pub url: String,
    #[sea_orm(column_type = "Text")]
    pub summary: String,
    /// JSON array of strings.
    #[sea_orm(column_type = "Text")]
    pub talking_points: String,
    /// JSON array of strings.
    #[sea_orm(column_type = "Text")]
    pub topics: String,
    pub fetched_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
