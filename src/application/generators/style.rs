//! 写作风格：生成风格指南 / 分析样文

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::prompts::{self, NovelMeta};
use super::{GenerationPipeline, GeneratorSettings};
use crate::application::error::ApplicationError;
use crate::application::ports::{ChatMessage, LanguageModelPort};

/// 样文超过这个长度时只取开头
const MAX_SAMPLE_CHARS: usize = 6000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleRequest {
    pub novel: NovelMeta,
    pub preferences: Option<String>,
    /// 参考作者或作品
    pub references: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeStyleRequest {
    pub sample: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StyleGuide {
    pub tone: String,
    pub point_of_view: String,
    pub tense: String,
    pub pacing: String,
    pub guidelines: Vec<String>,
}

impl StyleGuide {
    fn is_empty(&self) -> bool {
        self.tone.trim().is_empty()
            && self.point_of_view.trim().is_empty()
            && self.tense.trim().is_empty()
            && self.pacing.trim().is_empty()
            && self.guidelines.is_empty()
    }
}

const STYLE_OUTPUT: &str = "Return JSON: {\"tone\": string, \"pointOfView\": string, \"tense\": string, \
\"pacing\": string, \"guidelines\": [string]}";

fn truncate_sample(sample: &str) -> &str {
    match sample.char_indices().nth(MAX_SAMPLE_CHARS) {
        Some((cut, _)) => &sample[..cut],
        None => sample,
    }
}

pub struct StyleGenerator {
    pipeline: GenerationPipeline,
}

impl StyleGenerator {
    pub fn new(llm: Arc<dyn LanguageModelPort>, settings: GeneratorSettings) -> Self {
        Self {
            pipeline: GenerationPipeline::new("style", llm, settings),
        }
    }

    async fn request_guide(&self, prompt: String) -> Result<StyleGuide, ApplicationError> {
        let messages = vec![ChatMessage::system(prompts::STYLE_SYSTEM), ChatMessage::user(prompt)];
        self.pipeline
            .request_json(messages, |guide: StyleGuide| {
                if guide.is_empty() {
                    Err(ApplicationError::parse("style guide is empty", ""))
                } else {
                    Ok(guide)
                }
            })
            .await
    }

    pub async fn generate(&self, request: StyleRequest) -> Result<StyleGuide, ApplicationError> {
        let prompt = prompts::compose(
            "Propose a style guide for this novel.",
            vec![
                request.novel.render(),
                prompts::line("Author preferences", request.preferences.as_deref()),
                prompts::bullets("Reference works", &request.references),
            ],
            STYLE_OUTPUT,
        );
        self.request_guide(prompt).await
    }

    /// 从样文反推风格
    pub async fn analyze(&self, request: AnalyzeStyleRequest) -> Result<StyleGuide, ApplicationError> {
        let sample = request.sample.trim();
        if sample.is_empty() {
            return Err(ApplicationError::validation("sample must not be empty"));
        }

        let prompt = prompts::compose(
            "Describe the prose style of this sample so another writer could imitate it.",
            vec![Some(truncate_sample(sample).to_string())],
            STYLE_OUTPUT,
        );
        self.request_guide(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generators::test_support::scripted;

    #[tokio::test]
    async fn test_analyze_sample() {
        let reply = r#"{"tone": "wry", "pointOfView": "first person", "tense": "past", "guidelines": ["short sentences"]}"#;
        let generator = StyleGenerator::new(scripted(&[reply]), GeneratorSettings::default());

        let guide = generator
            .analyze(AnalyzeStyleRequest {
                sample: "I never liked the gate. It never liked me.".into(),
            })
            .await
            .unwrap();
        assert_eq!(guide.point_of_view, "first person");
        assert_eq!(guide.guidelines, vec!["short sentences"]);
        assert!(guide.pacing.is_empty());
    }

    #[tokio::test]
    async fn test_empty_guide_is_parse_error() {
        let generator = StyleGenerator::new(scripted(&["{}"]), GeneratorSettings::default());
        let err = generator.generate(StyleRequest::default()).await.unwrap_err();
        assert!(matches!(err, ApplicationError::Parse { .. }));
    }

    #[test]
    fn test_truncate_sample() {
        let long = "字".repeat(MAX_SAMPLE_CHARS + 10);
        assert_eq!(truncate_sample(&long).chars().count(), MAX_SAMPLE_CHARS);
    }
}
