//! Storyforge - 小说创作辅助的文本生成服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Storyline Context: 故事线、节点、连接，以及生成结果的下标翻译
//! - Sanitizer: 模型输出的 JSON 提取与数值清洗
//!
//! 应用层 (application/):
//! - Ports: LanguageModel, NovelRepository, StorylineRepository
//! - Context: 按小说 ID 组装生成上下文
//! - Generators: 角色、情节、章节、故事线、设定、文风、目标、对话
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: JSON API + SSE
//! - Persistence: SQLite
//! - Adapters: 托管 / 本地模型后端

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
