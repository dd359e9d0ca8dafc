pub use super::search_history::Entity as SearchHistory;
pub use super::video_stats::Entity as VideoStats;
pub use super::videos::Entity as Videos;
