//! Domain Layer - 领域层
//!
//! 包含:
//! - Storyline Context: 故事线图（节点、连接、生成结果翻译）
//! - Sanitizer: 模型输出清洗

pub mod sanitizer;
pub mod storyline;

pub use sanitizer::{
    clamp_or_default, extract_decimal_runs, parse_json_object, FlexibleText, SanitizeError,
    StructuredSetting,
};
