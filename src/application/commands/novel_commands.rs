//! Novel Commands
//!
//! 上下文组装读取的小说资料

use uuid::Uuid;

/// 创建小说
#[derive(Debug, Clone, Default)]
pub struct CreateNovel {
    pub title: String,
    pub genre: String,
    pub description: String,
    pub world_setting: String,
    pub style_guide: String,
}

/// 添加角色
#[derive(Debug, Clone)]
pub struct AddCharacter {
    pub novel_id: Uuid,
    pub name: String,
    pub description: String,
}

/// 添加情节点
#[derive(Debug, Clone)]
pub struct AddPlotPoint {
    pub novel_id: Uuid,
    pub title: String,
    pub description: String,
}

/// 添加章节
#[derive(Debug, Clone)]
pub struct AddChapter {
    pub novel_id: Uuid,
    pub chapter_number: u32,
    pub title: String,
    pub content: String,
    pub summary: String,
}
