//! Generation Handlers
//!
//! 批量生成接口：请求体直接反序列化为生成器请求，结果包在统一响应里返回。

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{
    AnalyzeStyleRequest, ChapterDraft, ChapterRequest, CharacterProfile, CharacterRequest,
    GoalRequest, PlotRequest, PlotSuggestion, PolishRequest, RefineCharacterRequest,
    SettingRequest, SettingResponse, StorylineRequest, StyleGuide, StyleRequest,
    SummarizeRequest, WritingGoals,
};
use crate::domain::storyline::GeneratedStoryline;
use crate::infrastructure::http::dto::{ApiResponse, TextResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Character
// ============================================================================

pub async fn generate_character(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CharacterRequest>,
) -> ApiResult<CharacterProfile> {
    let profile = state.character_generator.generate(req).await?;
    Ok(Json(ApiResponse::success(profile)))
}

pub async fn refine_character(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefineCharacterRequest>,
) -> ApiResult<TextResponse> {
    let text = state.character_generator.refine(req).await?;
    Ok(Json(ApiResponse::success(TextResponse { text })))
}

// ============================================================================
// Plot
// ============================================================================

pub async fn generate_plot(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlotRequest>,
) -> ApiResult<Vec<PlotSuggestion>> {
    let suggestions = state.plot_generator.suggest(req).await?;
    Ok(Json(ApiResponse::success(suggestions)))
}

// ============================================================================
// Chapter
// ============================================================================

pub async fn generate_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChapterRequest>,
) -> ApiResult<ChapterDraft> {
    let draft = state.chapter_generator.generate(req).await?;
    Ok(Json(ApiResponse::success(draft)))
}

pub async fn summarize_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeRequest>,
) -> ApiResult<TextResponse> {
    let text = state.chapter_generator.summarize(req).await?;
    Ok(Json(ApiResponse::success(TextResponse { text })))
}

pub async fn polish_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PolishRequest>,
) -> ApiResult<TextResponse> {
    let text = state.chapter_generator.polish(req).await?;
    Ok(Json(ApiResponse::success(TextResponse { text })))
}

// ============================================================================
// Storyline / Setting / Style / Goals
// ============================================================================

/// 生成故事线（不落库，接受后调用 /api/storyline/accept）
pub async fn generate_storyline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StorylineRequest>,
) -> ApiResult<Vec<GeneratedStoryline>> {
    let storylines = state.storyline_generator.generate(req).await?;
    Ok(Json(ApiResponse::success(storylines)))
}

pub async fn generate_setting(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SettingRequest>,
) -> ApiResult<SettingResponse> {
    let setting = state.setting_generator.generate(req).await?;
    Ok(Json(ApiResponse::success(setting)))
}

pub async fn generate_style(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StyleRequest>,
) -> ApiResult<StyleGuide> {
    let guide = state.style_generator.generate(req).await?;
    Ok(Json(ApiResponse::success(guide)))
}

pub async fn analyze_style(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeStyleRequest>,
) -> ApiResult<StyleGuide> {
    let guide = state.style_generator.analyze(req).await?;
    Ok(Json(ApiResponse::success(guide)))
}

pub async fn suggest_goals(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GoalRequest>,
) -> ApiResult<WritingGoals> {
    let goals = state.goal_generator.suggest(req).await?;
    Ok(Json(ApiResponse::success(goals)))
}
