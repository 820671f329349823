//! Storyline Queries

use uuid::Uuid;

/// 获取单条故事线
#[derive(Debug, Clone)]
pub struct GetStoryline {
    pub storyline_id: Uuid,
}

/// 列出小说的所有故事线
#[derive(Debug, Clone)]
pub struct ListStorylines {
    pub novel_id: Uuid,
}

/// 获取故事线及其全部节点和连接
#[derive(Debug, Clone)]
pub struct GetStorylineGraph {
    pub storyline_id: Uuid,
}
