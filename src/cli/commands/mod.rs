mod export;
mod history;
mod optimize;
mod search;

pub use export::cmd_export;
pub use history::cmd_history;
pub use optimize::{cmd_optimize, cmd_stats};
pub use search::cmd_search;
