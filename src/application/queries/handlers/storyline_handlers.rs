//! Storyline Query Handlers

use serde::Serialize;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::StorylineRepositoryPort;
use crate::application::queries::{GetStoryline, GetStorylineGraph, ListStorylines};
use crate::domain::storyline::{NodeConnection, StoryNode, Storyline};

/// 故事线图响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorylineGraphResponse {
    pub storyline: Storyline,
    pub nodes: Vec<StoryNode>,
    pub connections: Vec<NodeConnection>,
}

/// GetStoryline Handler
pub struct GetStorylineHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl GetStorylineHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, query: GetStoryline) -> Result<Storyline, ApplicationError> {
        self.storyline_repo
            .find_storyline(query.storyline_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Storyline", query.storyline_id))
    }
}

/// ListStorylines Handler
pub struct ListStorylinesHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl ListStorylinesHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, query: ListStorylines) -> Result<Vec<Storyline>, ApplicationError> {
        let storylines = self.storyline_repo.find_storylines_by_novel(query.novel_id).await?;
        Ok(storylines)
    }
}

/// GetStorylineGraph Handler
pub struct GetStorylineGraphHandler {
    storyline_repo: Arc<dyn StorylineRepositoryPort>,
}

impl GetStorylineGraphHandler {
    pub fn new(storyline_repo: Arc<dyn StorylineRepositoryPort>) -> Self {
        Self { storyline_repo }
    }

    pub async fn handle(&self, query: GetStorylineGraph) -> Result<StorylineGraphResponse, ApplicationError> {
        let storyline = self
            .storyline_repo
            .find_storyline(query.storyline_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Storyline", query.storyline_id))?;

        let nodes = self.storyline_repo.find_nodes(storyline.id).await?;
        let connections = self.storyline_repo.find_connections(storyline.id).await?;

        Ok(StorylineGraphResponse {
            storyline,
            nodes,
            connections,
        })
    }
}
