//! Storyline Context - Entities
//!
//! 不变量:
//! - StoryNode 只属于一个 Storyline
//! - NodeConnection 的两端必须是不同的节点
//! - NodeConnection 的权重在 [1, 10] 之内

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{
    ChapterRange, ConnectionType, NodeStatus, NodeType, Position, StorylineError, StorylineStatus,
    StorylineType, Weight,
};

/// 故事线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storyline {
    pub id: Uuid,
    pub novel_id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub storyline_type: StorylineType,
    pub status: StorylineStatus,
    pub priority: i32,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Storyline {
    pub const DEFAULT_COLOR: &'static str = "#4f46e5";

    pub fn new(
        novel_id: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        storyline_type: StorylineType,
    ) -> Result<Self, StorylineError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(StorylineError::EmptyTitle);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            novel_id,
            title,
            description: description.into(),
            storyline_type,
            status: StorylineStatus::Active,
            priority: 0,
            color: Self::DEFAULT_COLOR.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// 叙事节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryNode {
    pub id: Uuid,
    pub storyline_id: Uuid,
    pub title: String,
    pub description: String,
    pub node_type: NodeType,
    pub position: Position,
    pub chapter_range: Option<ChapterRange>,
    pub character_ids: BTreeSet<Uuid>,
    pub plot_point_ids: BTreeSet<Uuid>,
    pub status: NodeStatus,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoryNode {
    pub fn new(
        storyline_id: Uuid,
        title: impl Into<String>,
        node_type: NodeType,
        order_index: i32,
    ) -> Result<Self, StorylineError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(StorylineError::EmptyTitle);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            storyline_id,
            title,
            description: String::new(),
            node_type,
            position: Position::default(),
            chapter_range: None,
            character_ids: BTreeSet::new(),
            plot_point_ids: BTreeSet::new(),
            status: NodeStatus::Planned,
            order_index,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// 节点之间有向、带类型、带权重的边
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConnection {
    id: Uuid,
    from_node_id: Uuid,
    to_node_id: Uuid,
    connection_type: ConnectionType,
    description: String,
    weight: Weight,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NodeConnection {
    /// 创建连接，拒绝自环
    pub fn new(
        from_node_id: Uuid,
        to_node_id: Uuid,
        connection_type: ConnectionType,
        description: impl Into<String>,
        weight: Weight,
    ) -> Result<Self, StorylineError> {
        let now = Utc::now();
        Self::restore(
            Uuid::new_v4(),
            from_node_id,
            to_node_id,
            connection_type,
            description.into(),
            weight,
            now,
            now,
        )
    }

    /// 从持久化数据恢复（同样校验自环）
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        from_node_id: Uuid,
        to_node_id: Uuid,
        connection_type: ConnectionType,
        description: String,
        weight: Weight,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, StorylineError> {
        if from_node_id == to_node_id {
            return Err(StorylineError::SelfLoop(from_node_id.to_string()));
        }
        Ok(Self {
            id,
            from_node_id,
            to_node_id,
            connection_type,
            description,
            weight,
            created_at,
            updated_at,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn from_node_id(&self) -> Uuid {
        self.from_node_id
    }

    pub fn to_node_id(&self) -> Uuid {
        self.to_node_id
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn touches(&self, node_id: Uuid) -> bool {
        self.from_node_id == node_id || self.to_node_id == node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storyline_requires_title() {
        assert!(Storyline::new(Uuid::new_v4(), "  ", "", StorylineType::Main).is_err());
        let line = Storyline::new(Uuid::new_v4(), "Exile", "", StorylineType::Character).unwrap();
        assert_eq!(line.status, StorylineStatus::Active);
    }

    #[test]
    fn test_self_loop_rejected() {
        let node = Uuid::new_v4();
        let err = NodeConnection::new(node, node, ConnectionType::Cause, "", Weight::DEFAULT);
        assert!(matches!(err, Err(StorylineError::SelfLoop(_))));
    }

    #[test]
    fn test_connection_touches_both_ends() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let conn = NodeConnection::new(a, b, ConnectionType::Sequence, "then", Weight::DEFAULT).unwrap();
        assert!(conn.touches(a));
        assert!(conn.touches(b));
        assert!(!conn.touches(Uuid::new_v4()));
    }
}
