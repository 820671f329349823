//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod language_model;
mod repositories;

pub use language_model::{
    complete_with_callback, segment_channel, ChatMessage, CompletionOptions, CompletionStream,
    LanguageModelPort, LlmError, Role, SegmentSender,
};
pub use repositories::{
    ChapterRecord, CharacterRecord, NovelRecord, NovelRepositoryPort, PlotPointRecord,
    RepositoryError, StorylineRepositoryPort,
};
