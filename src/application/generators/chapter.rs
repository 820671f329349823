//! 章节生成、摘要、润色与流式写作

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

use super::prompts::{self, NovelMeta};
use super::{optional_context, GenerationPipeline, GeneratorSettings};
use crate::application::context::ContextAssembler;
use crate::application::error::ApplicationError;
use crate::application::ports::{ChatMessage, CompletionStream, LanguageModelPort};

const DEFAULT_TARGET_WORDS: u32 = 2000;
const DEFAULT_SUMMARY_WORDS: u32 = 150;
/// 模型未给出摘要时，截取正文开头作为摘要
const FALLBACK_SUMMARY_CHARS: usize = 200;

fn default_target_words() -> u32 {
    DEFAULT_TARGET_WORDS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRequest {
    #[serde(default)]
    pub novel_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub chapter_number: u32,
    #[serde(default)]
    pub novel: NovelMeta,
    #[serde(default)]
    pub outline: Option<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub plot_points: Vec<String>,
    #[serde(default)]
    pub previous_summary: Option<String>,
    #[serde(default = "default_target_words")]
    pub target_word_count: u32,
    /// 不要在本章收束任何情节线
    #[serde(default)]
    pub avoid_conclusion: bool,
}

impl ChapterRequest {
    pub fn new(title: impl Into<String>, chapter_number: u32) -> Self {
        Self {
            novel_id: None,
            title: title.into(),
            chapter_number,
            novel: NovelMeta::default(),
            outline: None,
            characters: Vec::new(),
            plot_points: Vec::new(),
            previous_summary: None,
            target_word_count: DEFAULT_TARGET_WORDS,
            avoid_conclusion: false,
        }
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.title.trim().is_empty() {
            return Err(ApplicationError::validation("title must not be empty"));
        }
        if self.target_word_count == 0 {
            return Err(ApplicationError::validation("targetWordCount must be positive"));
        }
        Ok(())
    }

    fn sections(&self) -> Vec<Option<String>> {
        let heading = if self.chapter_number > 0 {
            format!("Chapter {}: {}", self.chapter_number, self.title.trim())
        } else {
            self.title.trim().to_string()
        };
        vec![
            Some(heading),
            self.novel.render(),
            prompts::line("Outline", self.outline.as_deref()),
            prompts::bullets("Characters", &self.characters),
            prompts::bullets("Plot points", &self.plot_points),
            prompts::line("Previous chapter summary", self.previous_summary.as_deref()),
            Some(format!("Target length: about {} words.", self.target_word_count)),
            self.avoid_conclusion.then(|| {
                "Do not resolve or conclude any plot thread in this chapter.".to_string()
            }),
        ]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarizeRequest {
    pub content: String,
    pub max_words: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolishRequest {
    pub content: String,
    pub instruction: Option<String>,
}

/// 生成的章节正文及其衍生信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapterDraft {
    pub content: String,
    pub summary: String,
    #[serde(deserialize_with = "string_or_list")]
    pub key_events: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub character_development: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub plot_progress: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub foreshadowing: Vec<String>,
    pub next_chapter_hint: String,
}

/// 列表字段模型有时给字符串，有时给数组
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) if s.trim().is_empty() => Vec::new(),
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(items) => items,
        OneOrMany::Nothing(()) => Vec::new(),
    })
}

fn leading_chars(text: &str, limit: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

pub struct ChapterGenerator {
    pipeline: GenerationPipeline,
    context: Arc<ContextAssembler>,
}

impl ChapterGenerator {
    pub fn new(
        llm: Arc<dyn LanguageModelPort>,
        settings: GeneratorSettings,
        context: Arc<ContextAssembler>,
    ) -> Self {
        Self {
            pipeline: GenerationPipeline::new("chapter", llm, settings),
            context,
        }
    }

    /// 生成章节正文及衍生信息
    pub async fn generate(&self, request: ChapterRequest) -> Result<ChapterDraft, ApplicationError> {
        request.validate()?;

        let mut messages = optional_context(&self.context, self.pipeline.family(), request.novel_id).await?;
        messages.push(ChatMessage::system(prompts::CHAPTER_SYSTEM));
        messages.push(ChatMessage::user(prompts::compose(
            "Write the following chapter.",
            request.sections(),
            "Return a single JSON object with fields: content (the chapter prose), summary, \
keyEvents (array), characterDevelopment (array), plotProgress (array), foreshadowing (array), nextChapterHint.",
        )));

        self.pipeline
            .request_json(messages, |mut draft: ChapterDraft| {
                if draft.content.trim().is_empty() {
                    return Err(ApplicationError::parse("chapter has no content", ""));
                }
                if draft.summary.trim().is_empty() {
                    tracing::debug!("Chapter summary missing, using opening lines");
                    draft.summary = leading_chars(&draft.content, FALLBACK_SUMMARY_CHARS);
                }
                Ok(draft)
            })
            .await
    }

    /// 只生成摘要
    pub async fn summarize(&self, request: SummarizeRequest) -> Result<String, ApplicationError> {
        if request.content.trim().is_empty() {
            return Err(ApplicationError::validation("content must not be empty"));
        }
        let max_words = request.max_words.filter(|w| *w > 0).unwrap_or(DEFAULT_SUMMARY_WORDS);

        let messages = vec![
            ChatMessage::system(prompts::CHAPTER_SYSTEM),
            ChatMessage::user(prompts::compose(
                &format!("Summarize this chapter in at most {} words.", max_words),
                vec![Some(request.content)],
                "Reply with the summary as plain text only.",
            )),
        ];
        self.pipeline.request_text(messages).await
    }

    /// 按指令润色一段文字
    pub async fn polish(&self, request: PolishRequest) -> Result<String, ApplicationError> {
        if request.content.trim().is_empty() {
            return Err(ApplicationError::validation("content must not be empty"));
        }

        let messages = vec![
            ChatMessage::system(prompts::CHAPTER_SYSTEM),
            ChatMessage::user(prompts::compose(
                "Polish the following passage. Keep its meaning, point of view and tense.",
                vec![
                    prompts::line("Instruction", request.instruction.as_deref()),
                    Some(request.content),
                ],
                "Reply with the revised passage only.",
            )),
        ];
        self.pipeline.request_text(messages).await
    }

    /// 流式写作：只输出正文
    pub async fn stream(
        &self,
        request: ChapterRequest,
        deadline: Instant,
    ) -> Result<CompletionStream, ApplicationError> {
        request.validate()?;

        let mut messages = optional_context(&self.context, self.pipeline.family(), request.novel_id).await?;
        messages.push(ChatMessage::system(prompts::CHAPTER_SYSTEM));
        messages.push(ChatMessage::user(prompts::compose(
            "Write the following chapter.",
            request.sections(),
            "Reply with the chapter prose only, no headings or commentary.",
        )));
        self.pipeline.stream(messages, deadline).await
    }
}
