//! 世界观设定生成
//!
//! 模型可能把 worldSetting 写成一段文字，也可能写成
//! {background, powerSystem, socialStructure} 对象，两种都接受。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::prompts::{self, NovelMeta};
use super::{optional_context, GenerationPipeline, GeneratorSettings};
use crate::application::context::ContextAssembler;
use crate::application::error::ApplicationError;
use crate::application::ports::{ChatMessage, LanguageModelPort};
use crate::domain::sanitizer::strip_fences;
use crate::domain::{parse_json_object, FlexibleText};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingRequest {
    pub novel_id: Option<Uuid>,
    pub novel: NovelMeta,
    pub premise: String,
    /// 侧重点，如 magic system / politics
    pub focus: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingResponse {
    pub setting: FlexibleText,
    /// 展示用的展平文本
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingEnvelope {
    #[serde(alias = "setting")]
    world_setting: FlexibleText,
}

/// 回复里完全没有 JSON 时，整段文本即设定
fn decode_setting(raw: &str) -> Result<FlexibleText, ApplicationError> {
    let unfenced = strip_fences(raw);
    if !unfenced.contains('{') {
        return Ok(FlexibleText::PlainText(unfenced.trim().to_string()));
    }
    parse_json_object::<SettingEnvelope>(raw)
        .map(|envelope| envelope.world_setting)
        .map_err(ApplicationError::from)
}

pub struct SettingGenerator {
    pipeline: GenerationPipeline,
    context: Arc<ContextAssembler>,
}

impl SettingGenerator {
    pub fn new(
        llm: Arc<dyn LanguageModelPort>,
        settings: GeneratorSettings,
        context: Arc<ContextAssembler>,
    ) -> Self {
        Self {
            pipeline: GenerationPipeline::new("setting", llm, settings),
            context,
        }
    }

    pub async fn generate(&self, request: SettingRequest) -> Result<SettingResponse, ApplicationError> {
        if request.premise.trim().is_empty() && request.novel.render().is_none() {
            return Err(ApplicationError::validation("premise or novel metadata is required"));
        }

        let mut messages = optional_context(&self.context, self.pipeline.family(), request.novel_id).await?;
        messages.push(ChatMessage::system(prompts::SETTING_SYSTEM));
        messages.push(ChatMessage::user(prompts::compose(
            "Create the world setting for this novel.",
            vec![
                request.novel.render(),
                prompts::line("Premise", Some(&request.premise)),
                prompts::line("Focus", request.focus.as_deref()),
            ],
            "Return JSON: {\"worldSetting\": {\"background\": string, \"powerSystem\": string, \
\"socialStructure\": string}}",
        )));

        self.pipeline
            .run(messages, decode_setting, |setting: FlexibleText| {
                let text = setting.flatten();
                if text.trim().is_empty() {
                    return Err(ApplicationError::parse("world setting is empty", ""));
                }
                Ok(SettingResponse { setting, text })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generators::test_support::{context_assembler, scripted};

    fn request() -> SettingRequest {
        SettingRequest {
            premise: "A walled city guarding a sleeping god".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_structured_setting_is_flattened() {
        let reply = r#"{"worldSetting": {"background": "The wall is older than memory.", "socialStructure": "Wardens rule."}}"#;
        let generator = SettingGenerator::new(scripted(&[reply]), GeneratorSettings::default(), context_assembler().await);

        let response = generator.generate(request()).await.unwrap();
        assert!(matches!(response.setting, FlexibleText::Structured(_)));
        assert_eq!(
            response.text,
            "**Background**\nThe wall is older than memory.\n\n**Social Structure**\nWardens rule."
        );
    }

    #[tokio::test]
    async fn test_plain_text_setting_accepted() {
        let reply = r#"{"worldSetting": "A city of bells."}"#;
        let generator = SettingGenerator::new(scripted(&[reply]), GeneratorSettings::default(), context_assembler().await);

        let response = generator.generate(request()).await.unwrap();
        assert_eq!(response.setting, FlexibleText::PlainText("A city of bells.".into()));
        assert_eq!(response.text, "A city of bells.");
    }

    #[tokio::test]
    async fn test_prose_reply_used_verbatim() {
        let reply = "The city hums with bells that never stop ringing.";
        let generator = SettingGenerator::new(scripted(&[reply]), GeneratorSettings::default(), context_assembler().await);

        let response = generator.generate(request()).await.unwrap();
        assert_eq!(response.text, reply);
    }

    #[tokio::test]
    async fn test_broken_json_is_parse_error() {
        let reply = r#"{"worldSetting": {"background": "unterminated"#;
        let generator = SettingGenerator::new(scripted(&[reply]), GeneratorSettings::default(), context_assembler().await);

        let err = generator.generate(request()).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_empty_request_rejected() {
        let generator = SettingGenerator::new(scripted(&[]), GeneratorSettings::default(), context_assembler().await);
        let err = generator.generate(SettingRequest::default()).await.unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));
    }
}
