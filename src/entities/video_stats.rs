use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "video_stats")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub video_id: String,
    pub fetched_at: String,
    pub view_count: i64,
    pub like_count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
