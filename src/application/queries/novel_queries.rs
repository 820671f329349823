//! Novel Queries

use uuid::Uuid;

/// 获取小说资料（基本信息、角色、情节点、章节）
#[derive(Debug, Clone)]
pub struct GetNovel {
    pub novel_id: Uuid,
}
