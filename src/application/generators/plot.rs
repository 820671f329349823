//! 情节点建议

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::prompts::{self, NovelMeta};
use super::{optional_context, GenerationPipeline, GeneratorSettings};
use crate::application::context::ContextAssembler;
use crate::application::error::ApplicationError;
use crate::application::ports::{ChatMessage, LanguageModelPort};
use crate::domain::clamp_or_default;

pub const IMPORTANCE_MIN: u64 = 1;
pub const IMPORTANCE_MAX: u64 = 10;
pub const IMPORTANCE_DEFAULT: u64 = 5;

const MAX_SUGGESTIONS: u32 = 10;

fn default_count() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotRequest {
    #[serde(default)]
    pub novel_id: Option<Uuid>,
    #[serde(default)]
    pub novel: NovelMeta,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub existing_plot_points: Vec<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
}

impl Default for PlotRequest {
    fn default() -> Self {
        Self {
            novel_id: None,
            novel: NovelMeta::default(),
            characters: Vec::new(),
            existing_plot_points: Vec::new(),
            direction: None,
            count: default_count(),
        }
    }
}

/// 一条情节点建议
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotSuggestion {
    pub title: String,
    pub description: String,
    pub plot_type: String,
    /// [1, 10]，超出范围时为 5
    pub importance: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuggestion {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default, rename = "type")]
    plot_type: Option<String>,
    #[serde(default)]
    importance: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionEnvelope {
    #[serde(default, alias = "suggestions")]
    plot_points: Vec<RawSuggestion>,
}

/// 重要度可能是数字或数字字符串
fn importance_of(value: Option<&serde_json::Value>) -> u8 {
    let raw = value.and_then(|v| match v {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    });
    clamp_or_default(raw, IMPORTANCE_MIN..=IMPORTANCE_MAX, IMPORTANCE_DEFAULT) as u8
}

pub struct PlotGenerator {
    pipeline: GenerationPipeline,
    context: Arc<ContextAssembler>,
}

impl PlotGenerator {
    pub fn new(
        llm: Arc<dyn LanguageModelPort>,
        settings: GeneratorSettings,
        context: Arc<ContextAssembler>,
    ) -> Self {
        Self {
            pipeline: GenerationPipeline::new("plot", llm, settings),
            context,
        }
    }

    pub async fn suggest(&self, request: PlotRequest) -> Result<Vec<PlotSuggestion>, ApplicationError> {
        if request.count == 0 || request.count > MAX_SUGGESTIONS {
            return Err(ApplicationError::validation(format!(
                "count must be between 1 and {}",
                MAX_SUGGESTIONS
            )));
        }

        let mut messages = optional_context(&self.context, self.pipeline.family(), request.novel_id).await?;
        messages.push(ChatMessage::system(prompts::PLOT_SYSTEM));
        messages.push(ChatMessage::user(prompts::compose(
            &format!("Suggest {} new plot points for this novel.", request.count),
            vec![
                request.novel.render(),
                prompts::bullets("Characters", &request.characters),
                prompts::bullets("Existing plot points", &request.existing_plot_points),
                prompts::line("Direction", request.direction.as_deref()),
            ],
            "Return JSON: {\"plotPoints\": [{\"title\": string, \"description\": string, \
\"type\": string, \"importance\": integer 1-10}]}",
        )));

        let count = request.count as usize;
        self.pipeline
            .request_json(messages, move |envelope: SuggestionEnvelope| {
                let suggestions: Vec<PlotSuggestion> = envelope
                    .plot_points
                    .into_iter()
                    .filter(|raw| !raw.title.trim().is_empty())
                    .take(count)
                    .map(|raw| PlotSuggestion {
                        importance: importance_of(raw.importance.as_ref()),
                        title: raw.title,
                        description: raw.description,
                        plot_type: raw.plot_type.unwrap_or_else(|| "event".to_string()),
                    })
                    .collect();

                if suggestions.is_empty() {
                    return Err(ApplicationError::parse("no plot points in response", ""));
                }
                Ok(suggestions)
            })
            .await
    }
}
