//! 生成结果 - 无 ID、按下标寻址的临时结构
//!
//! 模型生成的节点列表作为 arena，连接通过 fromIndex/toIndex 引用其中的位置。
//! `resolve` 在内存中一次性把下标翻译成真实 ID，持久化层只接收翻译后的结果。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{
    ChapterRange, ChapterSpan, ConnectionType, NodeConnection, NodeStatus, NodeType, Position, StoryNode,
    Storyline, StorylineError, StorylineType, Weight,
};

/// 生成的故事线
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedStoryline {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub storyline_type: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub nodes: Vec<GeneratedNode>,
    #[serde(default)]
    pub connections: Vec<GeneratedConnection>,
}

/// 生成的节点
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedNode {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    /// 模型给出的范围未经校验，起止颠倒时在 resolve 中丢弃
    #[serde(default)]
    pub chapter_range: Option<ChapterSpan>,
    #[serde(default)]
    pub character_ids: BTreeSet<Uuid>,
    #[serde(default)]
    pub plot_point_ids: BTreeSet<Uuid>,
}

/// 生成的连接（下标引用）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedConnection {
    pub from_index: i64,
    pub to_index: i64,
    #[serde(default)]
    pub connection_type: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: Option<i64>,
}

/// 翻译完成、可以原子写入的故事线
#[derive(Debug, Clone)]
pub struct ResolvedStoryline {
    pub storyline: Storyline,
    pub nodes: Vec<StoryNode>,
    pub connections: Vec<NodeConnection>,
}

/// 未给出坐标时的自动布局
const LAYOUT_ORIGIN: f64 = 100.0;
const LAYOUT_STEP: f64 = 220.0;

impl GeneratedStoryline {
    /// 检查所有连接的下标都落在本故事线的节点列表内
    pub fn validate(&self) -> Result<(), StorylineError> {
        if self.title.trim().is_empty() {
            return Err(StorylineError::EmptyTitle);
        }
        if self.nodes.is_empty() {
            return Err(StorylineError::NoNodes(self.title.clone()));
        }

        let node_count = self.nodes.len();
        let in_bounds = |index: i64| index >= 0 && (index as usize) < node_count;

        for (i, conn) in self.connections.iter().enumerate() {
            if !in_bounds(conn.from_index) || !in_bounds(conn.to_index) {
                return Err(StorylineError::DanglingConnection {
                    storyline: self.title.clone(),
                    connection: i,
                    from: conn.from_index,
                    to: conn.to_index,
                    node_count,
                });
            }
            if conn.from_index == conn.to_index {
                return Err(StorylineError::SelfLoop(format!(
                    "{} (node #{})",
                    self.title, conn.from_index
                )));
            }
        }

        Ok(())
    }

    /// 把下标翻译成真实 ID
    pub fn resolve(&self, novel_id: Uuid) -> Result<ResolvedStoryline, StorylineError> {
        self.validate()?;

        let storyline_type = self
            .storyline_type
            .as_deref()
            .and_then(StorylineType::from_str)
            .unwrap_or_default();

        let mut storyline = Storyline::new(novel_id, &self.title, &self.description, storyline_type)?;
        if let Some(priority) = self.priority {
            storyline.priority = priority;
        }
        if let Some(color) = self.color.as_ref().filter(|c| !c.trim().is_empty()) {
            storyline.color = color.clone();
        }

        // position -> id
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (index, generated) in self.nodes.iter().enumerate() {
            let node_type = generated
                .node_type
                .as_deref()
                .and_then(NodeType::from_str)
                .unwrap_or_default();

            let mut node = StoryNode::new(storyline.id, &generated.title, node_type, index as i32)?;
            node.description = generated.description.clone();
            node.position = generated.position.unwrap_or_else(|| {
                Position::new(LAYOUT_ORIGIN + LAYOUT_STEP * index as f64, LAYOUT_ORIGIN)
            });
            node.chapter_range = generated
                .chapter_range
                .and_then(|span| ChapterRange::try_from(span).ok());
            node.character_ids = generated.character_ids.clone();
            node.plot_point_ids = generated.plot_point_ids.clone();
            node.status = NodeStatus::Planned;
            nodes.push(node);
        }
        let ids: Vec<Uuid> = nodes.iter().map(|n| n.id).collect();

        let connections = self
            .connections
            .iter()
            .map(|conn| {
                let connection_type = conn
                    .connection_type
                    .as_deref()
                    .and_then(ConnectionType::from_str)
                    .unwrap_or_default();
                NodeConnection::new(
                    ids[conn.from_index as usize],
                    ids[conn.to_index as usize],
                    connection_type,
                    conn.description.clone(),
                    Weight::or_default(conn.weight),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedStoryline {
            storyline,
            nodes,
            connections,
        })
    }
}
