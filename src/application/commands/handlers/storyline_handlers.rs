//! Storyline Command Handlers

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::commands::{
    CreateNodeConnection, CreateStoryNode, CreateStoryline, DeleteNodeConnection, DeleteStoryNode,
    DeleteStoryline, PersistGeneratedStorylines, UpdateStoryNode, UpdateStoryline,
};
use crate::application::error::ApplicationError;
use crate::application::ports::StorylineRepositoryPort;
use crate::domain::storyline::{
    NodeConnection, StoryNode, Storyline, StorylineError, Weight,
};

// ============================================================================
// PersistGeneratedStorylines
// ============================================================================

/// 单条生成故事线的落库结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedStoryline {
    pub title: String,
    pub storyline_id: Option<Uuid>,
    pub node_count: usize,
    pub connection_count: usize,
    pub error: Option<String>,
}

impl PersistedStoryline {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// PersistGeneratedStorylines Handler
///
/// 每条故事线：先在内存中把下标翻译成 ID，再在一个事务里写入。
/// 一条失败不影响其他条。
pub struct PersistGeneratedStorylinesHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl PersistGeneratedStorylinesHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(
        &self,
        command: PersistGeneratedStorylines,
    ) -> Result<Vec<PersistedStoryline>, ApplicationError> {
        if command.storylines.is_empty() {
            return Err(ApplicationError::validation("no storylines to persist"));
        }

        let mut results = Vec::with_capacity(command.storylines.len());
        for generated in &command.storylines {
            let result = match generated.resolve(command.novel_id) {
                Ok(resolved) => match self.storyline_repo.save_graph(&resolved).await {
                    Ok(()) => PersistedStoryline {
                        title: resolved.storyline.title.clone(),
                        storyline_id: Some(resolved.storyline.id),
                        node_count: resolved.nodes.len(),
                        connection_count: resolved.connections.len(),
                        error: None,
                    },
                    Err(e) => failed(&generated.title, ApplicationError::from(e)),
                },
                Err(e) => failed(&generated.title, ApplicationError::from(e)),
            };

            match &result.error {
                None => tracing::info!(
                    novel_id = %command.novel_id,
                    storyline_id = ?result.storyline_id,
                    nodes = result.node_count,
                    connections = result.connection_count,
                    "Generated storyline persisted"
                ),
                Some(error) => tracing::warn!(
                    novel_id = %command.novel_id,
                    title = %result.title,
                    error = %error,
                    "Generated storyline rejected"
                ),
            }
            results.push(result);
        }

        Ok(results)
    }
}

fn failed(title: &str, error: ApplicationError) -> PersistedStoryline {
    PersistedStoryline {
        title: title.to_string(),
        storyline_id: None,
        node_count: 0,
        connection_count: 0,
        error: Some(error.to_string()),
    }
}

// ============================================================================
// Storyline CRUD
// ============================================================================

async fn load_storyline(
    repo: &dyn StorylineRepositoryPort,
    storyline_id: Uuid,
) -> Result<Storyline, ApplicationError> {
    repo.find_storyline(storyline_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("Storyline", storyline_id))
}

async fn load_node(repo: &dyn StorylineRepositoryPort, node_id: Uuid) -> Result<StoryNode, ApplicationError> {
    repo.find_node(node_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("StoryNode", node_id))
}

/// CreateStoryline Handler
pub struct CreateStorylineHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl CreateStorylineHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, command: CreateStoryline) -> Result<Storyline, ApplicationError> {
        let mut storyline = Storyline::new(
            command.novel_id,
            command.title.trim(),
            command.description,
            command.storyline_type,
        )?;
        if let Some(priority) = command.priority {
            storyline.priority = priority;
        }
        if let Some(color) = command.color.filter(|c| !c.trim().is_empty()) {
            storyline.color = color;
        }

        self.storyline_repo.save_storyline(&storyline).await?;

        tracing::info!(
            storyline_id = %storyline.id,
            novel_id = %storyline.novel_id,
            title = %storyline.title,
            "Storyline created"
        );
        Ok(storyline)
    }
}

/// UpdateStoryline Handler
pub struct UpdateStorylineHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl UpdateStorylineHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, command: UpdateStoryline) -> Result<Storyline, ApplicationError> {
        let mut storyline = load_storyline(self.storyline_repo.as_ref(), command.storyline_id).await?;

        if let Some(title) = command.title {
            if title.trim().is_empty() {
                return Err(StorylineError::EmptyTitle.into());
            }
            storyline.title = title.trim().to_string();
        }
        if let Some(description) = command.description {
            storyline.description = description;
        }
        if let Some(storyline_type) = command.storyline_type {
            storyline.storyline_type = storyline_type;
        }
        if let Some(status) = command.status {
            storyline.status = status;
        }
        if let Some(priority) = command.priority {
            storyline.priority = priority;
        }
        if let Some(color) = command.color {
            storyline.color = color;
        }
        storyline.touch();

        self.storyline_repo.save_storyline(&storyline).await?;

        tracing::info!(storyline_id = %storyline.id, "Storyline updated");
        Ok(storyline)
    }
}

/// DeleteStoryline Handler
pub struct DeleteStorylineHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl DeleteStorylineHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, command: DeleteStoryline) -> Result<(), ApplicationError> {
        let storyline = load_storyline(self.storyline_repo.as_ref(), command.storyline_id).await?;

        self.storyline_repo.delete_storyline(storyline.id).await?;

        tracing::info!(
            storyline_id = %storyline.id,
            title = %storyline.title,
            "Storyline deleted"
        );
        Ok(())
    }
}

// ============================================================================
// StoryNode CRUD
// ============================================================================

/// CreateStoryNode Handler
pub struct CreateStoryNodeHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl CreateStoryNodeHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, command: CreateStoryNode) -> Result<StoryNode, ApplicationError> {
        let storyline = load_storyline(self.storyline_repo.as_ref(), command.storyline_id).await?;
        let existing = self.storyline_repo.find_nodes(storyline.id).await?;

        let mut node = StoryNode::new(
            storyline.id,
            command.title.trim(),
            command.node_type,
            existing.len() as i32,
        )?;
        node.description = command.description;
        if let Some(position) = command.position {
            node.position = position;
        }
        node.chapter_range = command.chapter_range;
        node.character_ids = command.character_ids.into_iter().collect();
        node.plot_point_ids = command.plot_point_ids.into_iter().collect();

        self.storyline_repo.save_node(&node).await?;

        tracing::info!(
            node_id = %node.id,
            storyline_id = %storyline.id,
            order_index = node.order_index,
            "Story node created"
        );
        Ok(node)
    }
}

/// UpdateStoryNode Handler
pub struct UpdateStoryNodeHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl UpdateStoryNodeHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, command: UpdateStoryNode) -> Result<StoryNode, ApplicationError> {
        let mut node = load_node(self.storyline_repo.as_ref(), command.node_id).await?;

        if let Some(title) = command.title {
            if title.trim().is_empty() {
                return Err(StorylineError::EmptyTitle.into());
            }
            node.title = title.trim().to_string();
        }
        if let Some(description) = command.description {
            node.description = description;
        }
        if let Some(node_type) = command.node_type {
            node.node_type = node_type;
        }
        if let Some(status) = command.status {
            node.status = status;
        }
        if let Some(position) = command.position {
            node.position = position;
        }
        if let Some(range) = command.chapter_range {
            node.chapter_range = Some(range);
        }
        if let Some(ids) = command.character_ids {
            node.character_ids = ids.into_iter().collect();
        }
        if let Some(ids) = command.plot_point_ids {
            node.plot_point_ids = ids.into_iter().collect();
        }
        if let Some(order_index) = command.order_index {
            node.order_index = order_index;
        }
        node.touch();

        self.storyline_repo.save_node(&node).await?;

        tracing::info!(node_id = %node.id, "Story node updated");
        Ok(node)
    }
}

/// DeleteStoryNode Handler
pub struct DeleteStoryNodeHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl DeleteStoryNodeHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, command: DeleteStoryNode) -> Result<(), ApplicationError> {
        let node = load_node(self.storyline_repo.as_ref(), command.node_id).await?;

        self.storyline_repo.delete_node(node.id).await?;

        tracing::info!(node_id = %node.id, storyline_id = %node.storyline_id, "Story node deleted");
        Ok(())
    }
}

// ============================================================================
// NodeConnection
// ============================================================================

/// CreateNodeConnection Handler
pub struct CreateNodeConnectionHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl CreateNodeConnectionHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, command: CreateNodeConnection) -> Result<NodeConnection, ApplicationError> {
        let weight = match command.weight {
            Some(w) => Weight::new(w)?,
            None => Weight::DEFAULT,
        };

        let from = load_node(self.storyline_repo.as_ref(), command.from_node_id).await?;
        let to = load_node(self.storyline_repo.as_ref(), command.to_node_id).await?;
        if from.storyline_id != to.storyline_id {
            return Err(StorylineError::ForeignNode {
                node: to.id,
                storyline: from.storyline_id,
            }
            .into());
        }

        let connection = NodeConnection::new(
            from.id,
            to.id,
            command.connection_type,
            command.description,
            weight,
        )?;
        self.storyline_repo.save_connection(&connection).await?;

        tracing::info!(
            connection_id = %connection.id(),
            from = %from.id,
            to = %to.id,
            connection_type = connection.connection_type().as_str(),
            "Node connection created"
        );
        Ok(connection)
    }
}

/// DeleteNodeConnection Handler
pub struct DeleteNodeConnectionHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl DeleteNodeConnectionHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, command: DeleteNodeConnection) -> Result<(), ApplicationError> {
        let connection = self
            .storyline_repo
            .find_connection(command.connection_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("NodeConnection", command.connection_id))?;

        self.storyline_repo.delete_connection(connection.id()).await?;

        tracing::info!(connection_id = %connection.id(), "Node connection deleted");
        Ok(())
    }
}
