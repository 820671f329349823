//! 模型输出清洗器
//!
//! 从模型返回的自由文本中恢复 JSON 对象，分三级回退：
//! 1. 去除首尾空白和代码围栏，截取第一个 `{` 到最后一个 `}`，严格解析
//! 2. 同样截取后再丢弃不可打印的 ASCII 控制字符，重新解析
//! 3. 仍失败则返回解析错误，只携带清洗后文本的前 500 个字符

use std::ops::RangeInclusive;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// 错误中保留的诊断片段长度（字符数）
pub const SNIPPET_CHARS: usize = 500;

static DECIMAL_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("valid regex for decimal runs"));

/// 清洗错误
#[derive(Debug, Clone, Error)]
pub enum SanitizeError {
    #[error("unparseable model response: {message}")]
    Unparseable {
        message: String,
        /// 清洗后文本的前 500 个字符
        snippet: String,
    },
}

impl SanitizeError {
    pub fn snippet(&self) -> &str {
        match self {
            SanitizeError::Unparseable { snippet, .. } => snippet,
        }
    }
}

/// 去除首尾空白和 Markdown 代码围栏（```json 或 ```）
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // 跳过语言标记（如 json）直到行尾
        text = match rest.find('\n') {
            Some(pos) if rest[..pos].chars().all(|c| c.is_ascii_alphanumeric()) => &rest[pos + 1..],
            _ => rest,
        };
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// 截取第一个 `{` 到最后一个 `}`（含）
pub fn slice_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// 丢弃不可打印的 ASCII 字符，保留空白和多字节字符
pub fn drop_unprintable(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii() || c.is_ascii_graphic() || c.is_ascii_whitespace())
        .collect()
}

fn snippet_of(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}

/// 从模型输出中解析一个 JSON 对象
pub fn parse_json_object<T: DeserializeOwned>(raw: &str) -> Result<T, SanitizeError> {
    let stripped = strip_fences(raw);

    // 第一级：严格解析
    let first_error = match slice_object(stripped) {
        Some(slice) => match serde_json::from_str::<T>(slice) {
            Ok(value) => return Ok(value),
            Err(e) => e.to_string(),
        },
        None => "no JSON object found".to_string(),
    };

    tracing::debug!(error = %first_error, "Strict JSON parse failed, retrying with printable filter");

    // 第二级：过滤不可打印字符后重试
    let cleaned = drop_unprintable(stripped);
    let second_error = match slice_object(&cleaned) {
        Some(slice) => match serde_json::from_str::<T>(slice) {
            Ok(value) => return Ok(value),
            Err(e) => e.to_string(),
        },
        None => "no JSON object found".to_string(),
    };

    // 第三级：放弃
    Err(SanitizeError::Unparseable {
        message: second_error,
        snippet: snippet_of(&cleaned),
    })
}

/// 提取文本中所有十进制数字串（按出现顺序）
///
/// 超出 u64 的数字串饱和为 `u64::MAX`，保留其位置
pub fn extract_decimal_runs(text: &str) -> Vec<u64> {
    DECIMAL_RUN_RE
        .find_iter(text)
        .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
        .collect()
}

/// 超出范围时静默替换为默认值
pub fn clamp_or_default(value: Option<u64>, range: RangeInclusive<u64>, default: u64) -> u64 {
    match value {
        Some(v) if range.contains(&v) => v,
        _ => default,
    }
}

// ============================================================================
// 文本 / 结构化 二选一
// ============================================================================

/// 结构化的世界观设定
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredSetting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_structure: Option<String>,
}

impl StructuredSetting {
    fn is_empty(&self) -> bool {
        self.background.is_none() && self.power_system.is_none() && self.social_structure.is_none()
    }
}

/// 模型可能返回纯文本，也可能返回结构化对象
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FlexibleText {
    PlainText(String),
    Structured(StructuredSetting),
}

impl FlexibleText {
    /// 两次尝试：先按结构化对象解码，再按字符串解码
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        if value.is_object() {
            if let Ok(structured) = serde_json::from_value::<StructuredSetting>(value.clone()) {
                if !structured.is_empty() {
                    return Ok(FlexibleText::Structured(structured));
                }
            }
        }

        serde_json::from_value::<String>(value)
            .map(FlexibleText::PlainText)
            .map_err(|_| "expected a string or an object with background/powerSystem/socialStructure".to_string())
    }

    /// 展平为展示用文本
    pub fn flatten(&self) -> String {
        match self {
            FlexibleText::PlainText(text) => text.clone(),
            FlexibleText::Structured(s) => [
                ("Background", &s.background),
                ("Power System", &s.power_system),
                ("Social Structure", &s.social_structure),
            ]
            .iter()
            .filter_map(|(header, body)| {
                body.as_deref()
                    .filter(|b| !b.trim().is_empty())
                    .map(|b| format!("**{}**\n{}", header, b.trim()))
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        }
    }
}

impl<'de> Deserialize<'de> for FlexibleText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        FlexibleText::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_plain_json() {
        let value: Value = parse_json_object(r#"{"a": 1, "b": "x"}"#).unwrap();
        assert_eq!(value, json!({"a": 1, "b": "x"}));
    }

    #[test]
    fn test_fenced_with_language_tag() {
        let raw = "```json\n{\"title\": \"The Gate\", \"n\": [1, 2]}\n```";
        let direct: Value = serde_json::from_str(r#"{"title": "The Gate", "n": [1, 2]}"#).unwrap();
        let value: Value = parse_json_object(raw).unwrap();
        assert_eq!(value, direct);
    }

    #[test]
    fn test_fenced_without_language_tag() {
        let raw = "```\n{\"k\": {\"nested\": true}}\n```\n";
        let value: Value = parse_json_object(raw).unwrap();
        assert_eq!(value, json!({"k": {"nested": true}}));
    }

    #[test]
    fn test_prose_around_object() {
        let raw = "Sure! Here is the result:\n{\"summary\": \"short\"}\nHope this helps.";
        let value: Value = parse_json_object(raw).unwrap();
        assert_eq!(value["summary"], "short");
    }

    #[test]
    fn test_control_characters_removed_on_second_tier() {
        let raw = "{\"name\": \"Ari\u{0007}a\", \"role\": \"龙骑士\"}";
        let value: Value = parse_json_object(raw).unwrap();
        assert_eq!(value["name"], "Aria");
        assert_eq!(value["role"], "龙骑士");
    }

    #[test]
    fn test_failure_carries_bounded_snippet() {
        let raw = format!("{{ not json {} }}", "x".repeat(2000));
        let err = parse_json_object::<Value>(&raw).unwrap_err();
        assert_eq!(err.snippet().chars().count(), SNIPPET_CHARS);
    }

    #[test]
    fn test_no_object_is_error() {
        assert!(parse_json_object::<Value>("just prose").is_err());
        assert!(parse_json_object::<Value>("} backwards {").is_err());
    }

    #[test]
    fn test_strip_fences_keeps_plain_text() {
        assert_eq!(strip_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_decimal_runs_in_order() {
        let runs = extract_decimal_runs("Daily 1500 words, weekly 9000, monthly 40000 (about 4 weeks).");
        assert_eq!(runs, vec![1500, 9000, 40000, 4]);
    }

    #[test]
    fn test_overflowing_run_keeps_its_position() {
        let runs = extract_decimal_runs("daily 1500, weekly 99999999999999999999999, monthly 40000");
        assert_eq!(runs, vec![1500, u64::MAX, 40000]);
    }

    #[test]
    fn test_clamp_or_default() {
        assert_eq!(clamp_or_default(Some(1500), 500..=10000, 1000), 1500);
        assert_eq!(clamp_or_default(Some(50), 500..=10000, 1000), 1000);
        assert_eq!(clamp_or_default(Some(20000), 500..=10000, 1000), 1000);
        assert_eq!(clamp_or_default(None, 500..=10000, 1000), 1000);
    }

    #[test]
    fn test_flexible_text_plain() {
        let text: FlexibleText = serde_json::from_value(json!("A drowned empire.")).unwrap();
        assert_eq!(text, FlexibleText::PlainText("A drowned empire.".to_string()));
        assert_eq!(text.flatten(), "A drowned empire.");
    }

    #[test]
    fn test_flexible_text_structured_flatten() {
        let text: FlexibleText = serde_json::from_value(json!({
            "background": "Sunken cities",
            "socialStructure": "Tide guilds"
        }))
        .unwrap();

        assert!(matches!(text, FlexibleText::Structured(_)));
        assert_eq!(
            text.flatten(),
            "**Background**\nSunken cities\n\n**Social Structure**\nTide guilds"
        );
    }

    #[test]
    fn test_flexible_text_rejects_other_shapes() {
        assert!(serde_json::from_value::<FlexibleText>(json!(42)).is_err());
        assert!(serde_json::from_value::<FlexibleText>(json!({"unrelated": 1})).is_err());
    }
}
