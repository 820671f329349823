//! Storyline Context - 故事线图限界上下文
//!
//! 职责:
//! - Storyline / StoryNode / NodeConnection 实体
//! - 生成结果（按下标寻址）到真实 ID 的翻译

mod entities;
mod errors;
mod generated;
mod value_objects;

pub use entities::{NodeConnection, StoryNode, Storyline};
pub use errors::StorylineError;
pub use generated::{GeneratedConnection, GeneratedNode, GeneratedStoryline, ResolvedStoryline};
pub use value_objects::{
    ChapterRange, ChapterSpan, ConnectionType, NodeStatus, NodeType, Position, StorylineStatus, StorylineType,
    Weight,
};
