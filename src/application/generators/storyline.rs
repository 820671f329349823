//! 故事线图生成
//!
//! 模型返回按下标寻址的节点/连接；这里只做结构校验，
//! 翻译成真实 ID 并落库由 `PersistGeneratedStorylinesHandler` 负责。

use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::prompts::{self, NovelMeta};
use super::{optional_context, GenerationPipeline, GeneratorSettings};
use crate::application::context::ContextAssembler;
use crate::application::error::ApplicationError;
use crate::application::ports::{ChatMessage, LanguageModelPort};
use crate::domain::storyline::{GeneratedStoryline, StorylineError};

pub const MAX_STORYLINES: u32 = 5;
pub const MIN_NODES: u32 = 2;
pub const MAX_NODES: u32 = 20;

fn default_storyline_count() -> u32 {
    1
}

fn default_nodes_per_line() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorylineRequest {
    #[serde(default)]
    pub novel_id: Option<Uuid>,
    #[serde(default)]
    pub novel: NovelMeta,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub main_conflict: String,
    #[serde(default = "default_storyline_count")]
    pub storyline_count: u32,
    #[serde(default = "default_nodes_per_line")]
    pub nodes_per_line: u32,
    #[serde(default)]
    pub existing_storylines: Vec<String>,
}

impl Default for StorylineRequest {
    fn default() -> Self {
        Self {
            novel_id: None,
            novel: NovelMeta::default(),
            characters: Vec::new(),
            main_conflict: String::new(),
            storyline_count: default_storyline_count(),
            nodes_per_line: default_nodes_per_line(),
            existing_storylines: Vec::new(),
        }
    }
}

impl StorylineRequest {
    fn validate(&self) -> Result<(), ApplicationError> {
        if !(1..=MAX_STORYLINES).contains(&self.storyline_count) {
            return Err(ApplicationError::validation(format!(
                "storylineCount must be between 1 and {}",
                MAX_STORYLINES
            )));
        }
        if !(MIN_NODES..=MAX_NODES).contains(&self.nodes_per_line) {
            return Err(ApplicationError::validation(format!(
                "nodesPerLine must be between {} and {}",
                MIN_NODES, MAX_NODES
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct StorylineEnvelope {
    #[serde(default)]
    storylines: Vec<GeneratedStoryline>,
}

pub struct StorylineGenerator {
    pipeline: GenerationPipeline,
    context: Arc<ContextAssembler>,
}

impl StorylineGenerator {
    pub fn new(
        llm: Arc<dyn LanguageModelPort>,
        settings: GeneratorSettings,
        context: Arc<ContextAssembler>,
    ) -> Self {
        Self {
            pipeline: GenerationPipeline::new("storyline", llm, settings),
            context,
        }
    }

    pub async fn generate(&self, request: StorylineRequest) -> Result<Vec<GeneratedStoryline>, ApplicationError> {
        request.validate()?;

        let mut messages = optional_context(&self.context, self.pipeline.family(), request.novel_id).await?;
        messages.push(ChatMessage::system(prompts::STORYLINE_SYSTEM));
        messages.push(ChatMessage::user(prompts::compose(
            &format!(
                "Design {} storyline(s) for this novel, each with exactly {} nodes.",
                request.storyline_count, request.nodes_per_line
            ),
            vec![
                request.novel.render(),
                prompts::bullets("Characters", &request.characters),
                prompts::line("Main conflict", Some(&request.main_conflict)),
                prompts::bullets("Existing storylines (do not duplicate)", &request.existing_storylines),
            ],
            "Return JSON: {\"storylines\": [{\"title\": string, \"description\": string, \
\"type\": \"main\"|\"character\"|\"plot\"|\"theme\", \"priority\": integer, \
\"nodes\": [{\"title\": string, \"description\": string, \"nodeType\": \"start\"|\"event\"|\"turning\"|\"merge\"|\"end\"}], \
\"connections\": [{\"fromIndex\": integer, \"toIndex\": integer, \
\"connectionType\": \"sequence\"|\"cause\"|\"parallel\"|\"condition\", \"description\": string, \"weight\": integer 1-10}]}]}. \
fromIndex and toIndex are zero-based positions in the same storyline's nodes array.",
        )));

        let wanted = request.storyline_count as usize;
        self.pipeline
            .request_json(messages, move |envelope: StorylineEnvelope| {
                let mut storylines = envelope.storylines;
                if storylines.is_empty() {
                    return Err(ApplicationError::parse("no storylines in response", ""));
                }
                if storylines.len() > wanted {
                    tracing::warn!(
                        returned = storylines.len(),
                        wanted,
                        "Model returned extra storylines, truncating"
                    );
                    storylines.truncate(wanted);
                }
                // 越界下标是完整性错误，整批拒绝
                for storyline in &storylines {
                    storyline.validate().map_err(|e| match e {
                        StorylineError::DanglingConnection { .. } | StorylineError::SelfLoop(_) => {
                            ApplicationError::from(e)
                        }
                        other => ApplicationError::parse(other.to_string(), ""),
                    })?;
                }
                Ok(storylines)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generators::test_support::{context_assembler, scripted};

    fn line_json(title: &str, nodes: usize, to: usize) -> String {
        let nodes: Vec<String> = (0..nodes)
            .map(|i| format!(r#"{{"title": "{} beat {}", "nodeType": "event"}}"#, title, i))
            .collect();
        let connections: Vec<String> = (1..=to)
            .map(|i| format!(r#"{{"fromIndex": {}, "toIndex": {}, "connectionType": "sequence", "weight": 6}}"#, i - 1, i))
            .collect();
        format!(
            r#"{{"title": "{}", "type": "plot", "nodes": [{}], "connections": [{}]}}"#,
            title,
            nodes.join(","),
            connections.join(",")
        )
    }

    #[tokio::test]
    async fn test_two_lines_of_four_nodes() {
        let reply = format!(
            r#"{{"storylines": [{}, {}]}}"#,
            line_json("Exile", 4, 3),
            line_json("Return", 4, 3)
        );
        let generator = StorylineGenerator::new(scripted(&[&reply]), GeneratorSettings::default(), context_assembler().await);

        let storylines = generator
            .generate(StorylineRequest {
                storyline_count: 2,
                nodes_per_line: 4,
                main_conflict: "Mira against the gate".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(storylines.len(), 2);
        for line in &storylines {
            assert_eq!(line.nodes.len(), 4);
            assert!(line
                .connections
                .iter()
                .all(|c| (0..4).contains(&c.from_index) && (0..4).contains(&c.to_index)));
        }
    }

    #[tokio::test]
    async fn test_dangling_index_is_integrity_error() {
        // 最后一个连接指向不存在的节点 #4
        let reply = format!(r#"{{"storylines": [{}]}}"#, line_json("Exile", 4, 4));
        let generator = StorylineGenerator::new(scripted(&[&reply]), GeneratorSettings::default(), context_assembler().await);

        let err = generator
            .generate(StorylineRequest {
                nodes_per_line: 4,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_invalid_counts_rejected_before_call() {
        let model = scripted(&[]);
        let generator = StorylineGenerator::new(model.clone(), GeneratorSettings::default(), context_assembler().await);
        let err = generator
            .generate(StorylineRequest {
                nodes_per_line: 1,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));
        assert_eq!(model.calls(), 0);
    }
}
