//! 角色生成

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::prompts::{self, NovelMeta};
use super::{optional_context, GenerationPipeline, GeneratorSettings};
use crate::application::context::ContextAssembler;
use crate::application::error::ApplicationError;
use crate::application::ports::{ChatMessage, LanguageModelPort};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterRequest {
    pub novel_id: Option<Uuid>,
    pub novel: NovelMeta,
    /// 指定名字（可选）
    pub name: Option<String>,
    /// 角色定位，如 protagonist / antagonist
    pub role: Option<String>,
    pub traits: Option<String>,
    pub existing_characters: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefineCharacterRequest {
    pub name: String,
    pub description: String,
    pub instruction: String,
}

/// 生成的角色档案
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterProfile {
    pub name: String,
    pub role: String,
    pub personality: String,
    pub background: String,
    pub appearance: String,
    pub motivation: String,
    pub arc: String,
}

pub struct CharacterGenerator {
    pipeline: GenerationPipeline,
    context: Arc<ContextAssembler>,
}

impl CharacterGenerator {
    pub fn new(
        llm: Arc<dyn LanguageModelPort>,
        settings: GeneratorSettings,
        context: Arc<ContextAssembler>,
    ) -> Self {
        Self {
            pipeline: GenerationPipeline::new("character", llm, settings),
            context,
        }
    }

    pub async fn generate(&self, request: CharacterRequest) -> Result<CharacterProfile, ApplicationError> {
        let mut messages = optional_context(&self.context, self.pipeline.family(), request.novel_id).await?;
        messages.push(ChatMessage::system(prompts::CHARACTER_SYSTEM));
        messages.push(ChatMessage::user(prompts::compose(
            "Create one character for this novel.",
            vec![
                request.novel.render(),
                prompts::line("Name", request.name.as_deref()),
                prompts::line("Role", request.role.as_deref()),
                prompts::line("Traits", request.traits.as_deref()),
                prompts::bullets("Existing characters (do not duplicate)", &request.existing_characters),
            ],
            "Return JSON with string fields: name, role, personality, background, appearance, motivation, arc.",
        )));

        let requested_name = request.name.filter(|n| !n.trim().is_empty());
        self.pipeline
            .request_json(messages, move |mut profile: CharacterProfile| {
                if profile.name.trim().is_empty() {
                    match requested_name {
                        Some(name) => profile.name = name,
                        None => return Err(ApplicationError::parse("character has no name", "")),
                    }
                }
                Ok(profile)
            })
            .await
    }

    /// 按指令修改已有角色描述，返回新的描述文本
    pub async fn refine(&self, request: RefineCharacterRequest) -> Result<String, ApplicationError> {
        if request.description.trim().is_empty() {
            return Err(ApplicationError::validation("description must not be empty"));
        }

        let messages = vec![
            ChatMessage::system(prompts::CHARACTER_SYSTEM),
            ChatMessage::user(prompts::compose(
                "Revise this character description.",
                vec![
                    prompts::line("Name", Some(&request.name)),
                    prompts::line("Current description", Some(&request.description)),
                    prompts::line("Instruction", Some(&request.instruction)),
                ],
                "Reply with the revised description as plain text, without JSON or commentary.",
            )),
        ];
        self.pipeline.request_text(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generators::test_support::{context_assembler, scripted};

    #[tokio::test]
    async fn test_generate_parses_profile() {
        let model = scripted(&[r#"Here you go: {"name": "Mira", "role": "gatekeeper", "motivation": "atone"}"#]);
        let generator = CharacterGenerator::new(model, GeneratorSettings::default(), context_assembler().await);

        let profile = generator
            .generate(CharacterRequest {
                novel_id: Some(Uuid::new_v4()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(profile.name, "Mira");
        assert_eq!(profile.motivation, "atone");
        assert!(profile.arc.is_empty());
    }

    #[tokio::test]
    async fn test_nameless_profile_uses_requested_name() {
        let model = scripted(&[r#"{"role": "rival"}"#]);
        let generator = CharacterGenerator::new(model, GeneratorSettings::default(), context_assembler().await);

        let profile = generator
            .generate(CharacterRequest {
                name: Some("Oren".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(profile.name, "Oren");
    }

    #[tokio::test]
    async fn test_refine_rejects_empty_description() {
        let model = scripted(&["unused"]);
        let generator = CharacterGenerator::new(model.clone(), GeneratorSettings::default(), context_assembler().await);
        let err = generator.refine(RefineCharacterRequest::default()).await.unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));
        assert_eq!(model.calls(), 0);
    }
}
