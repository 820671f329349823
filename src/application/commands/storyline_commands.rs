//! Storyline Commands

use uuid::Uuid;

use crate::domain::storyline::{
    ChapterRange, ConnectionType, GeneratedStoryline, NodeStatus, NodeType, Position,
    StorylineStatus, StorylineType,
};

/// 接受生成结果：每条故事线独立落库
#[derive(Debug, Clone)]
pub struct PersistGeneratedStorylines {
    pub novel_id: Uuid,
    pub storylines: Vec<GeneratedStoryline>,
}

/// 创建故事线
#[derive(Debug, Clone)]
pub struct CreateStoryline {
    pub novel_id: Uuid,
    pub title: String,
    pub description: String,
    pub storyline_type: StorylineType,
    pub priority: Option<i32>,
    pub color: Option<String>,
}

/// 更新故事线（None 表示不修改）
#[derive(Debug, Clone, Default)]
pub struct UpdateStoryline {
    pub storyline_id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub storyline_type: Option<StorylineType>,
    pub status: Option<StorylineStatus>,
    pub priority: Option<i32>,
    pub color: Option<String>,
}

/// 删除故事线（级联节点与连接）
#[derive(Debug, Clone)]
pub struct DeleteStoryline {
    pub storyline_id: Uuid,
}

/// 创建节点，追加到故事线末尾
#[derive(Debug, Clone)]
pub struct CreateStoryNode {
    pub storyline_id: Uuid,
    pub title: String,
    pub description: String,
    pub node_type: NodeType,
    pub position: Option<Position>,
    pub chapter_range: Option<ChapterRange>,
    pub character_ids: Vec<Uuid>,
    pub plot_point_ids: Vec<Uuid>,
}

/// 更新节点（None 表示不修改）
#[derive(Debug, Clone, Default)]
pub struct UpdateStoryNode {
    pub node_id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,
    pub node_type: Option<NodeType>,
    pub status: Option<NodeStatus>,
    pub position: Option<Position>,
    pub chapter_range: Option<ChapterRange>,
    pub character_ids: Option<Vec<Uuid>>,
    pub plot_point_ids: Option<Vec<Uuid>>,
    pub order_index: Option<i32>,
}

/// 删除节点（级联删除引用它的连接）
#[derive(Debug, Clone)]
pub struct DeleteStoryNode {
    pub node_id: Uuid,
}

/// 创建连接，两端节点必须存在且属于同一故事线
#[derive(Debug, Clone)]
pub struct CreateNodeConnection {
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
    pub connection_type: ConnectionType,
    pub description: String,
    /// 作者直接给出的权重必须在 [1, 10] 内
    pub weight: Option<i64>,
}

/// 删除连接
#[derive(Debug, Clone)]
pub struct DeleteNodeConnection {
    pub connection_id: Uuid,
}
