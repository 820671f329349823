//! Generators - 内容生成器
//!
//! 每个生成器拥有固定的 system prompt 和各操作的 prompt 构建函数，
//! 通过 `GenerationPipeline` 调用语言模型、清洗并校验输出。
//!
//! 单次调用的状态机：
//! `Idle → Requesting → {Parsing → Validating → Done} | Failed`
//! 生成器内部不重试，重试策略由调用方决定。

mod chapter;
mod character;
mod chat;
mod goal;
mod plot;
mod prompts;
mod setting;
mod storyline;
mod style;

pub use chapter::{ChapterDraft, ChapterGenerator, ChapterRequest, PolishRequest, SummarizeRequest};
pub use character::{CharacterGenerator, CharacterProfile, CharacterRequest, RefineCharacterRequest};
pub use chat::{ChatGenerator, ChatRequest};
pub use goal::{GoalGenerator, GoalRequest, WritingGoals};
pub use plot::{PlotGenerator, PlotRequest, PlotSuggestion};
pub use prompts::NovelMeta;
pub use setting::{SettingGenerator, SettingRequest, SettingResponse};
pub use storyline::{StorylineGenerator, StorylineRequest};
pub use style::{AnalyzeStyleRequest, StyleGenerator, StyleGuide, StyleRequest};

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::application::context::ContextAssembler;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ChatMessage, CompletionOptions, CompletionStream, LanguageModelPort, LlmError,
};
use crate::domain::parse_json_object;

/// 生成器配置（构造时注入）
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub options: CompletionOptions,
    /// 整个请求的超时
    pub timeout: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            options: CompletionOptions::default(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// 单次生成调用所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Idle,
    Requesting,
    Parsing,
    Validating,
    Done,
    Failed,
}

impl GenerationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStage::Idle => "idle",
            GenerationStage::Requesting => "requesting",
            GenerationStage::Parsing => "parsing",
            GenerationStage::Validating => "validating",
            GenerationStage::Done => "done",
            GenerationStage::Failed => "failed",
        }
    }
}

/// 单次调用的状态跟踪
struct GenerationRun {
    family: &'static str,
    stage: GenerationStage,
    started: Instant,
}

impl GenerationRun {
    fn start(family: &'static str) -> Self {
        Self {
            family,
            stage: GenerationStage::Idle,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: GenerationStage) {
        tracing::debug!(
            family = self.family,
            from = self.stage.as_str(),
            to = next.as_str(),
            "Generation stage"
        );
        self.stage = next;
    }

    fn finish<T>(mut self, result: Result<T, ApplicationError>) -> Result<T, ApplicationError> {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                self.advance(GenerationStage::Done);
                tracing::info!(family = self.family, elapsed_ms, "Generation completed");
            }
            Err(e) => {
                let failed_at = self.stage;
                self.advance(GenerationStage::Failed);
                match e {
                    ApplicationError::Parse { message, snippet } => tracing::warn!(
                        family = self.family,
                        stage = failed_at.as_str(),
                        error = %message,
                        snippet = %snippet,
                        "Generation failed"
                    ),
                    other => tracing::warn!(
                        family = self.family,
                        stage = failed_at.as_str(),
                        error = %other,
                        "Generation failed"
                    ),
                }
            }
        }
        result
    }
}

/// 所有生成器共享的调用管线
#[derive(Clone)]
pub struct GenerationPipeline {
    family: &'static str,
    llm: Arc<dyn LanguageModelPort>,
    settings: GeneratorSettings,
}

impl GenerationPipeline {
    pub fn new(family: &'static str, llm: Arc<dyn LanguageModelPort>, settings: GeneratorSettings) -> Self {
        Self { family, llm, settings }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    async fn call(&self, messages: &[ChatMessage]) -> Result<String, ApplicationError> {
        tracing::debug!(
            family = self.family,
            provider = self.llm.provider_name(),
            messages = messages.len(),
            "Requesting completion"
        );

        match tokio::time::timeout(
            self.settings.timeout,
            self.llm.complete(messages, &self.settings.options),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(LlmError::Timeout.into()),
        }
    }

    /// 通用流程：请求 → 解码 → 校验
    pub async fn run<R, T, D, V>(
        &self,
        messages: Vec<ChatMessage>,
        decode: D,
        validate: V,
    ) -> Result<T, ApplicationError>
    where
        D: FnOnce(&str) -> Result<R, ApplicationError>,
        V: FnOnce(R) -> Result<T, ApplicationError>,
    {
        let mut run = GenerationRun::start(self.family);

        run.advance(GenerationStage::Requesting);
        let raw = match self.call(&messages).await {
            Ok(raw) => raw,
            Err(e) => return run.finish(Err(e)),
        };

        run.advance(GenerationStage::Parsing);
        let decoded = match decode(&raw) {
            Ok(decoded) => decoded,
            Err(e) => return run.finish(Err(e)),
        };

        run.advance(GenerationStage::Validating);
        run.finish(validate(decoded))
    }

    /// 期望一个 JSON 对象的生成
    pub async fn request_json<R, T, V>(
        &self,
        messages: Vec<ChatMessage>,
        validate: V,
    ) -> Result<T, ApplicationError>
    where
        R: DeserializeOwned,
        V: FnOnce(R) -> Result<T, ApplicationError>,
    {
        self.run(
            messages,
            |raw| parse_json_object::<R>(raw).map_err(ApplicationError::from),
            validate,
        )
        .await
    }

    /// 期望一段纯文本的生成
    pub async fn request_text(&self, messages: Vec<ChatMessage>) -> Result<String, ApplicationError> {
        self.run(
            messages,
            |raw| Ok(strip_wrapping(raw).to_string()),
            |text: String| {
                if text.is_empty() {
                    Err(ApplicationError::parse("empty response", ""))
                } else {
                    Ok(text)
                }
            },
        )
        .await
    }

    /// 流式生成：建立流之后即完成，流中的错误由流的消费方处理
    ///
    /// `deadline` 与读取片段的一方共用，建立流耗去的时间不会再补回来
    pub async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        deadline: tokio::time::Instant,
    ) -> Result<CompletionStream, ApplicationError> {
        let mut run = GenerationRun::start(self.family);
        run.advance(GenerationStage::Requesting);

        let result = match tokio::time::timeout_at(
            deadline,
            self.llm.complete_streaming(&messages, &self.settings.options),
        )
        .await
        {
            Ok(result) => result.map_err(ApplicationError::from),
            Err(_) => Err(LlmError::Timeout.into()),
        };

        run.finish(result)
    }
}

/// 去除纯文本回复外层的空白、代码围栏和引号
fn strip_wrapping(raw: &str) -> &str {
    crate::domain::sanitizer::strip_fences(raw)
        .trim_matches('"')
        .trim()
}

/// 生成器可选的小说上下文：小说不存在时降级为无上下文
pub(crate) async fn optional_context(
    assembler: &ContextAssembler,
    family: &'static str,
    novel_id: Option<Uuid>,
) -> Result<Vec<ChatMessage>, ApplicationError> {
    let Some(novel_id) = novel_id else {
        return Ok(Vec::new());
    };

    match assembler.assemble(novel_id).await {
        Ok(message) => Ok(message.into_iter().collect()),
        Err(ApplicationError::NotFound { .. }) => {
            tracing::warn!(family, novel_id = %novel_id, "Novel not found, generating without context");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::infrastructure::adapters::ScriptedLanguageModel;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteNovelRepository,
    };

    pub async fn context_assembler() -> Arc<ContextAssembler> {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(ContextAssembler::new(Arc::new(SqliteNovelRepository::new(pool))))
    }

    /// 测试中不会触发的流式截止时间
    pub fn far_deadline() -> tokio::time::Instant {
        tokio::time::Instant::now() + Duration::from_secs(60)
    }

    pub fn scripted(replies: &[&str]) -> Arc<ScriptedLanguageModel> {
        Arc::new(ScriptedLanguageModel::with_replies(
            replies.iter().map(|r| r.to_string()).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::ScriptedLanguageModel;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Echo {
        value: String,
    }

    fn pipeline(model: ScriptedLanguageModel) -> GenerationPipeline {
        GenerationPipeline::new("test", Arc::new(model), GeneratorSettings::default())
    }

    #[tokio::test]
    async fn test_request_json_decodes_fenced_output() {
        let p = pipeline(ScriptedLanguageModel::with_replies(vec![
            "```json\n{\"value\": \"ok\"}\n```".to_string(),
        ]));
        let echo: Echo = p
            .request_json(vec![ChatMessage::user("hi")], |e: Echo| Ok(e))
            .await
            .unwrap();
        assert_eq!(echo.value, "ok");
    }

    #[tokio::test]
    async fn test_parse_failure_is_distinct_from_transport() {
        let p = pipeline(ScriptedLanguageModel::with_replies(vec!["no json here".to_string()]));
        let err = p
            .request_json(vec![ChatMessage::user("hi")], |e: Echo| Ok(e))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Parse { .. }));

        let p = pipeline(ScriptedLanguageModel::failing(LlmError::NetworkError("refused".into())));
        let err = p.request_text(vec![ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Generation(_)));
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_generation_error() {
        let model = ScriptedLanguageModel::with_replies(vec!["late".to_string()])
            .with_delay(Duration::from_millis(200));
        let settings = GeneratorSettings {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let p = GenerationPipeline::new("test", Arc::new(model), settings);
        let err = p.request_text(vec![ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Generation(LlmError::Timeout)));
    }

    #[tokio::test]
    async fn test_request_text_strips_wrapping() {
        let p = pipeline(ScriptedLanguageModel::with_replies(vec!["  \"A tighter line.\"  ".to_string()]));
        let text = p.request_text(vec![ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(text, "A tighter line.");
    }

    #[tokio::test]
    async fn test_no_internal_retry() {
        let model = Arc::new(ScriptedLanguageModel::with_replies(vec![
            "garbage".to_string(),
            "{\"value\": \"second\"}".to_string(),
        ]));
        let p = GenerationPipeline::new("test", model.clone(), GeneratorSettings::default());
        assert!(p
            .request_json(vec![ChatMessage::user("hi")], |e: Echo| Ok(e))
            .await
            .is_err());
        assert_eq!(model.calls(), 1);
    }
}
