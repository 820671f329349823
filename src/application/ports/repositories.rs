//! Repository Ports - 出站端口
//!
//! 定义数据持久化的抽象接口
//! 具体实现在 infrastructure 层（如 SQLite）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::storyline::{NodeConnection, ResolvedStoryline, StoryNode, Storyline};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// ============================================================================
// Novel Repository（上下文组装只读取这些数据）
// ============================================================================

/// 小说实体
#[derive(Debug, Clone)]
pub struct NovelRecord {
    pub id: Uuid,
    pub title: String,
    pub genre: String,
    pub description: String,
    pub world_setting: String,
    pub style_guide: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 角色实体
#[derive(Debug, Clone)]
pub struct CharacterRecord {
    pub id: Uuid,
    pub novel_id: Uuid,
    pub name: String,
    pub description: String,
}

/// 情节点实体
#[derive(Debug, Clone)]
pub struct PlotPointRecord {
    pub id: Uuid,
    pub novel_id: Uuid,
    pub title: String,
    pub description: String,
}

/// 章节实体
#[derive(Debug, Clone)]
pub struct ChapterRecord {
    pub id: Uuid,
    pub novel_id: Uuid,
    pub chapter_number: u32,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Novel Repository Port
#[async_trait]
pub trait NovelRepositoryPort: Send + Sync {
    /// 保存小说
    async fn save_novel(&self, novel: &NovelRecord) -> Result<(), RepositoryError>;

    /// 根据 ID 查找小说
    async fn find_novel(&self, id: Uuid) -> Result<Option<NovelRecord>, RepositoryError>;

    /// 保存角色
    async fn save_character(&self, character: &CharacterRecord) -> Result<(), RepositoryError>;

    /// 获取小说的所有角色
    async fn find_characters(&self, novel_id: Uuid) -> Result<Vec<CharacterRecord>, RepositoryError>;

    /// 保存情节点
    async fn save_plot_point(&self, plot_point: &PlotPointRecord) -> Result<(), RepositoryError>;

    /// 获取小说的所有情节点
    async fn find_plot_points(&self, novel_id: Uuid) -> Result<Vec<PlotPointRecord>, RepositoryError>;

    /// 保存章节
    async fn save_chapter(&self, chapter: &ChapterRecord) -> Result<(), RepositoryError>;

    /// 获取最近的章节（按章节号降序）
    async fn find_recent_chapters(
        &self,
        novel_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChapterRecord>, RepositoryError>;
}

// ============================================================================
// Storyline Repository
// ============================================================================

/// Storyline Repository Port
#[async_trait]
pub trait StorylineRepositoryPort: Send + Sync {
    /// 在一个事务中写入故事线、节点和连接
    async fn save_graph(&self, graph: &ResolvedStoryline) -> Result<(), RepositoryError>;

    /// 保存故事线（存在则更新）
    async fn save_storyline(&self, storyline: &Storyline) -> Result<(), RepositoryError>;

    /// 根据 ID 查找故事线
    async fn find_storyline(&self, id: Uuid) -> Result<Option<Storyline>, RepositoryError>;

    /// 获取小说的所有故事线
    async fn find_storylines_by_novel(&self, novel_id: Uuid) -> Result<Vec<Storyline>, RepositoryError>;

    /// 删除故事线，级联删除节点和连接
    async fn delete_storyline(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// 保存节点（存在则更新）
    async fn save_node(&self, node: &StoryNode) -> Result<(), RepositoryError>;

    /// 根据 ID 查找节点
    async fn find_node(&self, id: Uuid) -> Result<Option<StoryNode>, RepositoryError>;

    /// 获取故事线的所有节点（按 order_index）
    async fn find_nodes(&self, storyline_id: Uuid) -> Result<Vec<StoryNode>, RepositoryError>;

    /// 删除节点，级联删除引用它的连接
    async fn delete_node(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// 保存连接
    async fn save_connection(&self, connection: &NodeConnection) -> Result<(), RepositoryError>;

    /// 根据 ID 查找连接
    async fn find_connection(&self, id: Uuid) -> Result<Option<NodeConnection>, RepositoryError>;

    /// 获取故事线内的所有连接
    async fn find_connections(&self, storyline_id: Uuid) -> Result<Vec<NodeConnection>, RepositoryError>;

    /// 删除连接
    async fn delete_connection(&self, id: Uuid) -> Result<(), RepositoryError>;
}
