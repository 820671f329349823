//! Storyline HTTP Handlers

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::{
    CreateNodeConnection, CreateStoryNode, CreateStoryline, DeleteNodeConnection,
    DeleteStoryNode, DeleteStoryline, GetStoryline, GetStorylineGraph, ListStorylines,
    PersistGeneratedStorylines, PersistedStoryline, StorylineGraphResponse, UpdateStoryNode,
    UpdateStoryline,
};
use crate::domain::storyline::{
    ChapterRange, ConnectionType, GeneratedStoryline, NodeConnection, NodeStatus, NodeType,
    Position, StoryNode, Storyline, StorylineStatus, StorylineType,
};
use crate::infrastructure::http::dto::{ApiResponse, Empty, IdRequest, NovelIdRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptStorylinesRequest {
    pub novel_id: Uuid,
    pub storylines: Vec<GeneratedStoryline>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStorylineRequest {
    pub novel_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub storyline_type: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStorylineRequest {
    pub id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub storyline_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeRequest {
    pub storyline_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub chapter_start: Option<u32>,
    #[serde(default)]
    pub chapter_end: Option<u32>,
    #[serde(default)]
    pub character_ids: Vec<Uuid>,
    #[serde(default)]
    pub plot_point_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNodeRequest {
    pub id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub node_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub chapter_start: Option<u32>,
    #[serde(default)]
    pub chapter_end: Option<u32>,
    #[serde(default)]
    pub character_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub plot_point_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub order_index: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionRequest {
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
    #[serde(default)]
    pub connection_type: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub weight: Option<i64>,
}

// ============================================================================
// 参数解析
// ============================================================================

/// 作者直接提交的枚举值不做回退，未知值视为参数错误
fn parse_enum<T>(
    value: Option<&str>,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, ApiError> {
    match value {
        None => Ok(None),
        Some(raw) => parse(raw)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown {}: '{}'", field, raw))),
    }
}

fn chapter_range(start: Option<u32>, end: Option<u32>) -> Result<Option<ChapterRange>, ApiError> {
    match (start, end) {
        (None, None) => Ok(None),
        (Some(start), None) => Ok(Some(ChapterRange { start, end: start })),
        (None, Some(_)) => Err(ApiError::BadRequest(
            "chapterEnd requires chapterStart".to_string(),
        )),
        (Some(start), Some(end)) => ChapterRange::new(start, end)
            .map(Some)
            .map_err(|e| ApiError::BadRequest(e.to_string())),
    }
}

// ============================================================================
// Storyline Handlers
// ============================================================================

/// 接受生成的故事线，每条独立落库
pub async fn accept_storylines(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AcceptStorylinesRequest>,
) -> Result<Json<ApiResponse<Vec<PersistedStoryline>>>, ApiError> {
    let command = PersistGeneratedStorylines {
        novel_id: req.novel_id,
        storylines: req.storylines,
    };

    let results = state.persist_storylines_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(results)))
}

pub async fn create_storyline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStorylineRequest>,
) -> Result<Json<ApiResponse<Storyline>>, ApiError> {
    let storyline_type = parse_enum(req.storyline_type.as_deref(), "storyline type", StorylineType::from_str)?;

    let command = CreateStoryline {
        novel_id: req.novel_id,
        title: req.title,
        description: req.description,
        storyline_type: storyline_type.unwrap_or_default(),
        priority: req.priority,
        color: req.color,
    };

    let storyline = state.create_storyline_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(storyline)))
}

pub async fn update_storyline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateStorylineRequest>,
) -> Result<Json<ApiResponse<Storyline>>, ApiError> {
    let command = UpdateStoryline {
        storyline_id: req.id,
        title: req.title,
        description: req.description,
        storyline_type: parse_enum(req.storyline_type.as_deref(), "storyline type", StorylineType::from_str)?,
        status: parse_enum(req.status.as_deref(), "storyline status", StorylineStatus::from_str)?,
        priority: req.priority,
        color: req.color,
    };

    let storyline = state.update_storyline_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(storyline)))
}

pub async fn delete_storyline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state
        .delete_storyline_handler
        .handle(DeleteStoryline { storyline_id: req.id })
        .await?;
    Ok(Json(ApiResponse::ok()))
}

/// 获取故事线及其节点和连接
pub async fn get_storyline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Result<Json<ApiResponse<StorylineGraphResponse>>, ApiError> {
    let graph = state
        .get_storyline_graph_handler
        .handle(GetStorylineGraph { storyline_id: req.id })
        .await?;
    Ok(Json(ApiResponse::success(graph)))
}

/// 只获取故事线本身
pub async fn get_storyline_meta(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Result<Json<ApiResponse<Storyline>>, ApiError> {
    let storyline = state
        .get_storyline_handler
        .handle(GetStoryline { storyline_id: req.id })
        .await?;
    Ok(Json(ApiResponse::success(storyline)))
}

pub async fn list_storylines(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NovelIdRequest>,
) -> Result<Json<ApiResponse<Vec<Storyline>>>, ApiError> {
    let storylines = state
        .list_storylines_handler
        .handle(ListStorylines { novel_id: req.novel_id })
        .await?;
    Ok(Json(ApiResponse::success(storylines)))
}

// ============================================================================
// Node Handlers
// ============================================================================

pub async fn create_node(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<Json<ApiResponse<StoryNode>>, ApiError> {
    let node_type = parse_enum(req.node_type.as_deref(), "node type", NodeType::from_str)?;

    let command = CreateStoryNode {
        storyline_id: req.storyline_id,
        title: req.title,
        description: req.description,
        node_type: node_type.unwrap_or_default(),
        position: req.position,
        chapter_range: chapter_range(req.chapter_start, req.chapter_end)?,
        character_ids: req.character_ids,
        plot_point_ids: req.plot_point_ids,
    };

    let node = state.create_node_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(node)))
}

pub async fn update_node(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateNodeRequest>,
) -> Result<Json<ApiResponse<StoryNode>>, ApiError> {
    let command = UpdateStoryNode {
        node_id: req.id,
        title: req.title,
        description: req.description,
        node_type: parse_enum(req.node_type.as_deref(), "node type", NodeType::from_str)?,
        status: parse_enum(req.status.as_deref(), "node status", NodeStatus::from_str)?,
        position: req.position,
        chapter_range: chapter_range(req.chapter_start, req.chapter_end)?,
        character_ids: req.character_ids,
        plot_point_ids: req.plot_point_ids,
        order_index: req.order_index,
    };

    let node = state.update_node_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(node)))
}

pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state
        .delete_node_handler
        .handle(DeleteStoryNode { node_id: req.id })
        .await?;
    Ok(Json(ApiResponse::ok()))
}

// ============================================================================
// Connection Handlers
// ============================================================================

pub async fn create_connection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConnectionRequest>,
) -> Result<Json<ApiResponse<NodeConnection>>, ApiError> {
    let connection_type = parse_enum(
        req.connection_type.as_deref(),
        "connection type",
        ConnectionType::from_str,
    )?;

    let command = CreateNodeConnection {
        from_node_id: req.from_node_id,
        to_node_id: req.to_node_id,
        connection_type: connection_type.unwrap_or_default(),
        description: req.description,
        weight: req.weight,
    };

    let connection = state.create_connection_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(connection)))
}

pub async fn delete_connection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state
        .delete_connection_handler
        .handle(DeleteNodeConnection { connection_id: req.id })
        .await?;
    Ok(Json(ApiResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enum_rejects_unknown() {
        assert!(parse_enum(Some("telepathy"), "connection type", ConnectionType::from_str).is_err());
        assert_eq!(
            parse_enum(Some("Cause"), "connection type", ConnectionType::from_str).unwrap(),
            Some(ConnectionType::Cause)
        );
        assert_eq!(parse_enum(None, "node type", NodeType::from_str).unwrap(), None);
    }

    #[test]
    fn test_chapter_range_from_request() {
        assert!(chapter_range(None, None).unwrap().is_none());
        assert_eq!(
            chapter_range(Some(4), None).unwrap(),
            Some(ChapterRange { start: 4, end: 4 })
        );
        assert!(chapter_range(Some(5), Some(2)).is_err());
        assert!(chapter_range(None, Some(2)).is_err());
    }
}
