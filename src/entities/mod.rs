pub mod prelude;

pub mod search_history;
pub mod video_stats;
pub mod videos;
