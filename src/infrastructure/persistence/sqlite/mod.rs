//! SQLite Persistence - SQLite 数据库持久化实现

mod database;
mod novel_repo;
mod storyline_repo;

pub use database::*;
pub use novel_repo::SqliteNovelRepository;
pub use storyline_repo::SqliteStorylineRepository;
