//! 写作目标建议
//!
//! 只需要三个数字，不走 JSON：从回复中按顺序提取十进制数字串，
//! 前三个依次对应 daily / weekly / monthly，超出范围静默替换为默认值。

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;

use super::prompts;
use super::{GenerationPipeline, GeneratorSettings};
use crate::application::error::ApplicationError;
use crate::application::ports::{ChatMessage, LanguageModelPort};
use crate::domain::{clamp_or_default, extract_decimal_runs};

pub const DAILY_RANGE: RangeInclusive<u64> = 500..=10_000;
pub const DAILY_DEFAULT: u64 = 1_000;
pub const WEEKLY_RANGE: RangeInclusive<u64> = 3_500..=70_000;
pub const WEEKLY_DEFAULT: u64 = 7_000;
pub const MONTHLY_RANGE: RangeInclusive<u64> = 15_000..=300_000;
pub const MONTHLY_DEFAULT: u64 = 30_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoalRequest {
    /// 全书目标字数
    pub target_word_count: Option<u64>,
    pub current_word_count: Option<u64>,
    pub deadline_days: Option<u32>,
    pub hours_per_day: Option<f32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingGoals {
    pub daily: u64,
    pub weekly: u64,
    pub monthly: u64,
}

impl Default for WritingGoals {
    fn default() -> Self {
        Self {
            daily: DAILY_DEFAULT,
            weekly: WEEKLY_DEFAULT,
            monthly: MONTHLY_DEFAULT,
        }
    }
}

impl WritingGoals {
    /// 位置映射 + 范围校验
    pub fn from_numbers(numbers: &[u64]) -> Self {
        Self {
            daily: clamp_or_default(numbers.first().copied(), DAILY_RANGE, DAILY_DEFAULT),
            weekly: clamp_or_default(numbers.get(1).copied(), WEEKLY_RANGE, WEEKLY_DEFAULT),
            monthly: clamp_or_default(numbers.get(2).copied(), MONTHLY_RANGE, MONTHLY_DEFAULT),
        }
    }
}

pub struct GoalGenerator {
    pipeline: GenerationPipeline,
}

impl GoalGenerator {
    pub fn new(llm: Arc<dyn LanguageModelPort>, settings: GeneratorSettings) -> Self {
        Self {
            pipeline: GenerationPipeline::new("goal", llm, settings),
        }
    }

    pub async fn suggest(&self, request: GoalRequest) -> Result<WritingGoals, ApplicationError> {
        let fmt = |v: Option<u64>| v.map(|n| n.to_string());
        let prompt = prompts::compose(
            "Suggest daily, weekly and monthly word-count goals for this author.",
            vec![
                prompts::line("Target word count", fmt(request.target_word_count).as_deref()),
                prompts::line("Words written so far", fmt(request.current_word_count).as_deref()),
                prompts::line("Days until deadline", request.deadline_days.map(|d| d.to_string()).as_deref()),
                prompts::line("Hours available per day", request.hours_per_day.map(|h| h.to_string()).as_deref()),
                prompts::line("Notes", request.notes.as_deref()),
            ],
            "Answer with exactly three integers in this order: daily, weekly, monthly. \
No thousands separators and no other numbers.",
        );
        let messages = vec![ChatMessage::system(prompts::GOAL_SYSTEM), ChatMessage::user(prompt)];

        self.pipeline
            .run(
                messages,
                |raw| Ok(extract_decimal_runs(raw)),
                |numbers: Vec<u64>| {
                    if numbers.len() < 3 {
                        tracing::warn!(found = numbers.len(), "Fewer than three goal numbers, using defaults");
                    }
                    let goals = WritingGoals::from_numbers(&numbers);
                    if numbers.iter().take(3).ne([goals.daily, goals.weekly, goals.monthly].iter()) {
                        tracing::debug!(?numbers, ?goals, "Goal suggestions adjusted to documented ranges");
                    }
                    Ok(goals)
                },
            )
            .await
    }
}
