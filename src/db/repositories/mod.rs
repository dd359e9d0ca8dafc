pub mod history;
pub mod video;
