//! Storyline Context - Value Objects

use serde::{Deserialize, Serialize};

use super::StorylineError;

/// 故事线类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorylineType {
    #[default]
    Main,
    Character,
    Plot,
    Theme,
}

impl StorylineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorylineType::Main => "main",
            StorylineType::Character => "character",
            StorylineType::Plot => "plot",
            StorylineType::Theme => "theme",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Some(StorylineType::Main),
            "character" => Some(StorylineType::Character),
            "plot" => Some(StorylineType::Plot),
            "theme" => Some(StorylineType::Theme),
            _ => None,
        }
    }
}

/// 故事线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorylineStatus {
    #[default]
    Active,
    Completed,
    Paused,
}

impl StorylineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorylineStatus::Active => "active",
            StorylineStatus::Completed => "completed",
            StorylineStatus::Paused => "paused",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(StorylineStatus::Active),
            "completed" => Some(StorylineStatus::Completed),
            "paused" => Some(StorylineStatus::Paused),
            _ => None,
        }
    }
}

/// 节点在结构上的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Start,
    #[default]
    Event,
    Turning,
    Merge,
    End,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Start => "start",
            NodeType::Event => "event",
            NodeType::Turning => "turning",
            NodeType::Merge => "merge",
            NodeType::End => "end",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Some(NodeType::Start),
            "event" => Some(NodeType::Event),
            "turning" => Some(NodeType::Turning),
            "merge" => Some(NodeType::Merge),
            "end" => Some(NodeType::End),
            _ => None,
        }
    }
}

/// 节点写作状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Planned,
    Writing,
    Completed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Planned => "planned",
            NodeStatus::Writing => "writing",
            NodeStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planned" => Some(NodeStatus::Planned),
            "writing" => Some(NodeStatus::Writing),
            "completed" => Some(NodeStatus::Completed),
            _ => None,
        }
    }
}

/// 连接类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Sequence,
    Cause,
    Parallel,
    Condition,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Sequence => "sequence",
            ConnectionType::Cause => "cause",
            ConnectionType::Parallel => "parallel",
            ConnectionType::Condition => "condition",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" => Some(ConnectionType::Sequence),
            "cause" => Some(ConnectionType::Cause),
            "parallel" => Some(ConnectionType::Parallel),
            "condition" => Some(ConnectionType::Condition),
            _ => None,
        }
    }
}

/// 画布坐标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 节点覆盖的章节范围（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChapterSpan")]
pub struct ChapterRange {
    pub start: u32,
    pub end: u32,
}

/// 未经校验的章节起止，模型输出和反序列化的中间形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSpan {
    pub start: u32,
    pub end: u32,
}

impl TryFrom<ChapterSpan> for ChapterRange {
    type Error = StorylineError;

    fn try_from(span: ChapterSpan) -> Result<Self, Self::Error> {
        ChapterRange::new(span.start, span.end)
    }
}

impl ChapterRange {
    pub fn new(start: u32, end: u32) -> Result<Self, StorylineError> {
        if start > end {
            return Err(StorylineError::InvalidChapterRange { start, end });
        }
        Ok(Self { start, end })
    }
}

/// 连接权重 1..=10
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Weight(u8);

impl Weight {
    pub const MIN: i64 = 1;
    pub const MAX: i64 = 10;
    pub const DEFAULT: Weight = Weight(5);

    pub fn new(value: i64) -> Result<Self, StorylineError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(StorylineError::InvalidWeight(value));
        }
        Ok(Self(value as u8))
    }

    /// 模型给出的权重不可信，超出范围时替换为默认值
    pub fn or_default(value: Option<i64>) -> Self {
        value
            .and_then(|v| Self::new(v).ok())
            .unwrap_or(Self::DEFAULT)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Weight {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for Weight {
    type Error = StorylineError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Weight::new(value)
    }
}

impl From<Weight> for i64 {
    fn from(weight: Weight) -> Self {
        weight.0 as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip_strings() {
        assert_eq!(NodeType::from_str("Turning"), Some(NodeType::Turning));
        assert_eq!(ConnectionType::from_str(" cause "), Some(ConnectionType::Cause));
        assert_eq!(StorylineType::from_str("subplot"), None);
        assert_eq!(NodeStatus::Writing.as_str(), "writing");
    }

    #[test]
    fn test_weight_bounds() {
        assert!(Weight::new(0).is_err());
        assert!(Weight::new(11).is_err());
        assert_eq!(Weight::new(10).unwrap().value(), 10);
        assert_eq!(Weight::or_default(Some(42)), Weight::DEFAULT);
        assert_eq!(Weight::or_default(None).value(), 5);
    }

    #[test]
    fn test_weight_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Weight>("3").is_ok());
        assert!(serde_json::from_str::<Weight>("0").is_err());
    }

    #[test]
    fn test_chapter_range() {
        assert!(ChapterRange::new(3, 5).is_ok());
        assert!(ChapterRange::new(5, 3).is_err());
    }

    #[test]
    fn test_chapter_range_deserialize_validates() {
        let range: ChapterRange = serde_json::from_str(r#"{"start":2,"end":4}"#).unwrap();
        assert_eq!(range, ChapterRange { start: 2, end: 4 });
        assert!(serde_json::from_str::<ChapterRange>(r#"{"start":10,"end":2}"#).is_err());
    }
}
