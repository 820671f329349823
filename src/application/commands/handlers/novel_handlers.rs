//! Novel Command Handlers

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::application::commands::{AddChapter, AddCharacter, AddPlotPoint, CreateNovel};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ChapterRecord, CharacterRecord, NovelRecord, NovelRepositoryPort, PlotPointRecord,
};

fn require(field: &str, value: &str) -> Result<(), ApplicationError> {
    if value.trim().is_empty() {
        return Err(ApplicationError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

// ============================================================================
// CreateNovel
// ============================================================================

/// CreateNovel Handler
pub struct CreateNovelHandler {
    novel_repo: Arc<dyn NovelRepositoryPort>,
}

impl CreateNovelHandler {
    pub fn new(novel_repo: Arc<dyn NovelRepositoryPort>) -> Self {
        Self { novel_repo }
    }

    pub async fn handle(&self, command: CreateNovel) -> Result<NovelRecord, ApplicationError> {
        require("title", &command.title)?;

        let now = Utc::now();
        let novel = NovelRecord {
            id: Uuid::new_v4(),
            title: command.title.trim().to_string(),
            genre: command.genre,
            description: command.description,
            world_setting: command.world_setting,
            style_guide: command.style_guide,
            created_at: now,
            updated_at: now,
        };
        self.novel_repo.save_novel(&novel).await?;

        tracing::info!(novel_id = %novel.id, title = %novel.title, "Novel created");
        Ok(novel)
    }
}

// ============================================================================
// AddCharacter / AddPlotPoint / AddChapter
// ============================================================================

/// 先确认小说存在
async fn ensure_novel(repo: &dyn NovelRepositoryPort, novel_id: Uuid) -> Result<(), ApplicationError> {
    repo.find_novel(novel_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApplicationError::not_found("Novel", novel_id))
}

/// AddCharacter Handler
pub struct AddCharacterHandler {
    novel_repo: Arc<dyn NovelRepositoryPort>,
}

impl AddCharacterHandler {
    pub fn new(novel_repo: Arc<dyn NovelRepositoryPort>) -> Self {
        Self { novel_repo }
    }

    pub async fn handle(&self, command: AddCharacter) -> Result<CharacterRecord, ApplicationError> {
        require("name", &command.name)?;
        ensure_novel(self.novel_repo.as_ref(), command.novel_id).await?;

        let character = CharacterRecord {
            id: Uuid::new_v4(),
            novel_id: command.novel_id,
            name: command.name.trim().to_string(),
            description: command.description,
        };
        self.novel_repo.save_character(&character).await?;

        tracing::info!(novel_id = %command.novel_id, character_id = %character.id, "Character added");
        Ok(character)
    }
}

/// AddPlotPoint Handler
pub struct AddPlotPointHandler {
    novel_repo: Arc<dyn NovelRepositoryPort>,
}

impl AddPlotPointHandler {
    pub fn new(novel_repo: Arc<dyn NovelRepositoryPort>) -> Self {
        Self { novel_repo }
    }

    pub async fn handle(&self, command: AddPlotPoint) -> Result<PlotPointRecord, ApplicationError> {
        require("title", &command.title)?;
        ensure_novel(self.novel_repo.as_ref(), command.novel_id).await?;

        let plot_point = PlotPointRecord {
            id: Uuid::new_v4(),
            novel_id: command.novel_id,
            title: command.title.trim().to_string(),
            description: command.description,
        };
        self.novel_repo.save_plot_point(&plot_point).await?;

        tracing::info!(novel_id = %command.novel_id, plot_point_id = %plot_point.id, "Plot point added");
        Ok(plot_point)
    }
}

/// AddChapter Handler
pub struct AddChapterHandler {
    novel_repo: Arc<dyn NovelRepositoryPort>,
}

impl AddChapterHandler {
    pub fn new(novel_repo: Arc<dyn NovelRepositoryPort>) -> Self {
        Self { novel_repo }
    }

    pub async fn handle(&self, command: AddChapter) -> Result<ChapterRecord, ApplicationError> {
        require("title", &command.title)?;
        if command.chapter_number == 0 {
            return Err(ApplicationError::validation("chapterNumber starts at 1"));
        }
        ensure_novel(self.novel_repo.as_ref(), command.novel_id).await?;

        let chapter = ChapterRecord {
            id: Uuid::new_v4(),
            novel_id: command.novel_id,
            chapter_number: command.chapter_number,
            title: command.title.trim().to_string(),
            content: command.content,
            summary: command.summary,
            created_at: Utc::now(),
        };
        self.novel_repo.save_chapter(&chapter).await?;

        tracing::info!(
            novel_id = %command.novel_id,
            chapter_number = chapter.chapter_number,
            "Chapter added"
        );
        Ok(chapter)
    }
}
