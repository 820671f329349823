//! Novel HTTP Handlers
//!
//! 小说资料的录入与读取，生成器组装上下文时从这里读到的数据取材。

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::queries::handlers::{
    ChapterSummaryResponse, NamedEntryResponse, NovelResponse,
};
use crate::application::{
    AddChapter, AddCharacter, AddPlotPoint, CreateNovel, GetNovel, NovelOverviewResponse,
};
use crate::infrastructure::http::dto::{ApiResponse, IdRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNovelRequest {
    pub title: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub world_setting: String,
    #[serde(default)]
    pub style_guide: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCharacterRequest {
    pub novel_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPlotPointRequest {
    pub novel_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChapterRequest {
    pub novel_id: Uuid,
    pub chapter_number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub summary: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn create_novel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNovelRequest>,
) -> Result<Json<ApiResponse<NovelResponse>>, ApiError> {
    let command = CreateNovel {
        title: req.title,
        genre: req.genre,
        description: req.description,
        world_setting: req.world_setting,
        style_guide: req.style_guide,
    };

    let novel = state.create_novel_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(novel.into())))
}

/// 获取小说概览（角色、情节点、最近章节）
pub async fn get_novel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Result<Json<ApiResponse<NovelOverviewResponse>>, ApiError> {
    let overview = state
        .get_novel_handler
        .handle(GetNovel { novel_id: req.id })
        .await?;
    Ok(Json(ApiResponse::success(overview)))
}

pub async fn add_character(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddCharacterRequest>,
) -> Result<Json<ApiResponse<NamedEntryResponse>>, ApiError> {
    let command = AddCharacter {
        novel_id: req.novel_id,
        name: req.name,
        description: req.description,
    };

    let character = state.add_character_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(character.into())))
}

pub async fn add_plot_point(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddPlotPointRequest>,
) -> Result<Json<ApiResponse<NamedEntryResponse>>, ApiError> {
    let command = AddPlotPoint {
        novel_id: req.novel_id,
        title: req.title,
        description: req.description,
    };

    let plot_point = state.add_plot_point_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(plot_point.into())))
}

/// 写入章节，同章节号覆盖
pub async fn add_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddChapterRequest>,
) -> Result<Json<ApiResponse<ChapterSummaryResponse>>, ApiError> {
    let command = AddChapter {
        novel_id: req.novel_id,
        chapter_number: req.chapter_number,
        title: req.title,
        content: req.content,
        summary: req.summary,
    };

    let chapter = state.add_chapter_handler.handle(command).await?;
    Ok(Json(ApiResponse::success(chapter.into())))
}
