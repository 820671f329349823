//! 应用层错误定义
//!
//! 统一的命令/查询/生成错误类型。生成相关错误分为四类：
//! - NotConfigured: 模型后端未配置（调用之前即失败）
//! - Generation: 调用失败（网络、超时、非 2xx）
//! - Parse: 模型有回应但无法使用
//! - Integrity: 生成的图引用了越界下标

use thiserror::Error;
use uuid::Uuid;

use crate::application::ports::{LlmError, RepositoryError};
use crate::domain::storyline::StorylineError;
use crate::domain::SanitizeError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: Uuid,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 模型后端未配置
    #[error("Language model unavailable: {0}")]
    NotConfigured(String),

    /// 模型调用失败
    #[error("Generation failed: {0}")]
    Generation(#[source] LlmError),

    /// 模型输出无法解析
    #[error("Model response could not be parsed: {message}")]
    Parse {
        message: String,
        /// 截断后的诊断片段，不直接返回给终端用户
        snippet: String,
    },

    /// 生成的图结构不一致
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: Uuid) -> Self {
        Self::NotFound { resource_type, id }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建解析错误
    pub fn parse(message: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            snippet: snippet.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        Self::RepositoryError(err.to_string())
    }
}

impl From<LlmError> for ApplicationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::NotConfigured(msg) => Self::NotConfigured(msg),
            other => Self::Generation(other),
        }
    }
}

impl From<SanitizeError> for ApplicationError {
    fn from(err: SanitizeError) -> Self {
        match err {
            SanitizeError::Unparseable { message, snippet } => Self::Parse { message, snippet },
        }
    }
}

impl From<StorylineError> for ApplicationError {
    fn from(err: StorylineError) -> Self {
        match err {
            StorylineError::DanglingConnection { .. } | StorylineError::SelfLoop(_) => {
                Self::Integrity(err.to_string())
            }
            other => Self::ValidationError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_is_distinct_from_transport() {
        let err: ApplicationError = LlmError::NotConfigured("missing api key".into()).into();
        assert!(matches!(err, ApplicationError::NotConfigured(_)));

        let err: ApplicationError = LlmError::Timeout.into();
        assert!(matches!(err, ApplicationError::Generation(LlmError::Timeout)));
    }

    #[test]
    fn test_dangling_connection_is_integrity() {
        let err: ApplicationError = StorylineError::DanglingConnection {
            storyline: "Exile".into(),
            connection: 0,
            from: 0,
            to: 9,
            node_count: 4,
        }
        .into();
        assert!(matches!(err, ApplicationError::Integrity(_)));
    }
}
