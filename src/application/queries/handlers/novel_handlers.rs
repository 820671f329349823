//! Novel Query Handlers

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::context::RECENT_CHAPTER_LIMIT;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ChapterRecord, CharacterRecord, NovelRecord, NovelRepositoryPort, PlotPointRecord,
};
use crate::application::queries::GetNovel;

// ============================================================================
// Response DTOs
// ============================================================================

/// 小说详情响应
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NovelResponse {
    pub id: Uuid,
    pub title: String,
    pub genre: String,
    pub description: String,
    pub world_setting: String,
    pub style_guide: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<NovelRecord> for NovelResponse {
    fn from(record: NovelRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            genre: record.genre,
            description: record.description,
            world_setting: record.world_setting,
            style_guide: record.style_guide,
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

/// 角色 / 情节点的简要信息
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedEntryResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

impl From<CharacterRecord> for NamedEntryResponse {
    fn from(record: CharacterRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
        }
    }
}

impl From<PlotPointRecord> for NamedEntryResponse {
    fn from(record: PlotPointRecord) -> Self {
        Self {
            id: record.id,
            name: record.title,
            description: record.description,
        }
    }
}

/// 章节摘要（不含正文）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummaryResponse {
    pub id: Uuid,
    pub chapter_number: u32,
    pub title: String,
    pub summary: String,
}

impl From<ChapterRecord> for ChapterSummaryResponse {
    fn from(record: ChapterRecord) -> Self {
        Self {
            id: record.id,
            chapter_number: record.chapter_number,
            title: record.title,
            summary: record.summary,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NovelOverviewResponse {
    pub novel: NovelResponse,
    pub characters: Vec<NamedEntryResponse>,
    pub plot_points: Vec<NamedEntryResponse>,
    /// 最近几章，升序
    pub recent_chapters: Vec<ChapterSummaryResponse>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GetNovel Handler
pub struct GetNovelHandler {
    novel_repo: Arc<dyn NovelRepositoryPort>,
}

impl GetNovelHandler {
    pub fn new(novel_repo: Arc<dyn NovelRepositoryPort>) -> Self {
        Self { novel_repo }
    }

    pub async fn handle(&self, query: GetNovel) -> Result<NovelOverviewResponse, ApplicationError> {
        let novel = self
            .novel_repo
            .find_novel(query.novel_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Novel", query.novel_id))?;

        let characters = self.novel_repo.find_characters(query.novel_id).await?;
        let plot_points = self.novel_repo.find_plot_points(query.novel_id).await?;
        let mut chapters = self
            .novel_repo
            .find_recent_chapters(query.novel_id, RECENT_CHAPTER_LIMIT)
            .await?;
        chapters.reverse();

        Ok(NovelOverviewResponse {
            novel: novel.into(),
            characters: characters.into_iter().map(Into::into).collect(),
            plot_points: plot_points.into_iter().map(Into::into).collect(),
            recent_chapters: chapters.into_iter().map(Into::into).collect(),
        })
    }
}
