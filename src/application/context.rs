//! Context Assembler - 上下文组装
//!
//! 每次调用前从小说数据中组装一条 system 消息：
//! 小说基本信息、角色、情节点、最近章节摘要。结果只在本次调用中使用，不持久化。

use std::sync::Arc;
use uuid::Uuid;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    ChapterRecord, CharacterRecord, ChatMessage, NovelRecord, NovelRepositoryPort, PlotPointRecord,
};

/// 纳入上下文的最近章节数
pub const RECENT_CHAPTER_LIMIT: usize = 5;

const CONTEXT_PREAMBLE: &str =
    "You are assisting an author with their novel. Stay consistent with these established facts.";

/// 上下文组装器
pub struct ContextAssembler {
    novel_repo: Arc<dyn NovelRepositoryPort>,
}

impl ContextAssembler {
    pub fn new(novel_repo: Arc<dyn NovelRepositoryPort>) -> Self {
        Self { novel_repo }
    }

    /// 组装上下文消息；没有任何可用内容时返回 None
    pub async fn assemble(&self, novel_id: Uuid) -> Result<Option<ChatMessage>, ApplicationError> {
        let novel = self
            .novel_repo
            .find_novel(novel_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Novel", novel_id))?;

        let characters = self.novel_repo.find_characters(novel_id).await?;
        let plot_points = self.novel_repo.find_plot_points(novel_id).await?;

        // 降序取最近 N 章，再反转为升序
        let mut chapters = self
            .novel_repo
            .find_recent_chapters(novel_id, RECENT_CHAPTER_LIMIT)
            .await?;
        chapters.reverse();

        let sections: Vec<String> = [
            render_header(&novel),
            render_characters(&characters),
            render_plot_points(&plot_points),
            render_chapters(&chapters),
        ]
        .into_iter()
        .flatten()
        .collect();

        tracing::debug!(
            novel_id = %novel_id,
            characters = characters.len(),
            plot_points = plot_points.len(),
            chapters = chapters.len(),
            sections = sections.len(),
            "Context assembled"
        );

        if sections.is_empty() {
            return Ok(None);
        }

        Ok(Some(ChatMessage::system(format!(
            "{}\n\n{}",
            CONTEXT_PREAMBLE,
            sections.join("\n\n")
        ))))
    }

    /// 把上下文消息放在对话最前面
    pub async fn with_context(
        &self,
        novel_id: Uuid,
        conversation: Vec<ChatMessage>,
    ) -> Result<Vec<ChatMessage>, ApplicationError> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if let Some(context) = self.assemble(novel_id).await? {
            messages.push(context);
        }
        messages.extend(conversation);
        Ok(messages)
    }
}

fn render_header(novel: &NovelRecord) -> Option<String> {
    let lines: Vec<String> = [
        ("Title", &novel.title),
        ("Genre", &novel.genre),
        ("Description", &novel.description),
        ("World setting", &novel.world_setting),
        ("Style guide", &novel.style_guide),
    ]
    .iter()
    .filter(|(_, value)| !value.trim().is_empty())
    .map(|(label, value)| format!("{}: {}", label, value.trim()))
    .collect();

    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn render_bullets(heading: &str, items: impl Iterator<Item = String>) -> Option<String> {
    let bullets: Vec<String> = items.map(|item| format!("- {}", item)).collect();
    (!bullets.is_empty()).then(|| format!("{}:\n{}", heading, bullets.join("\n")))
}

fn render_characters(characters: &[CharacterRecord]) -> Option<String> {
    render_bullets(
        "Characters",
        characters
            .iter()
            .map(|c| format!("{}: {}", c.name, c.description)),
    )
}

fn render_plot_points(plot_points: &[PlotPointRecord]) -> Option<String> {
    render_bullets(
        "Plot points",
        plot_points
            .iter()
            .map(|p| format!("{}: {}", p.title, p.description)),
    )
}

fn render_chapters(chapters: &[ChapterRecord]) -> Option<String> {
    render_bullets(
        "Recent chapters",
        chapters
            .iter()
            .filter(|c| !c.summary.trim().is_empty())
            .map(|c| format!("Chapter {}: {}", c.chapter_number, c.summary.trim())),
    )
}
