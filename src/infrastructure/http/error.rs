//! HTTP Error Handling
//!
//! 所有错误都以 HTTP 200 + `{errno, error, data}` 返回。
//! 解析失败的诊断片段只写日志，不返回给调用方。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::{ApplicationError, RepositoryError};

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const UNPROCESSABLE: i32 = 422;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const BAD_GATEWAY: i32 = 502;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// 模型有回应但不可用（解析失败或图不一致）
    Unprocessable(String),
    Internal(String),
    /// 模型调用失败
    BadGateway(String),
    /// 模型后端未配置
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn errno(&self) -> i32 {
        match self {
            ApiError::NotFound(_) => errno::NOT_FOUND,
            ApiError::BadRequest(_) => errno::BAD_REQUEST,
            ApiError::Conflict(_) => errno::CONFLICT,
            ApiError::Unprocessable(_) => errno::UNPROCESSABLE,
            ApiError::Internal(_) => errno::INTERNAL_ERROR,
            ApiError::BadGateway(_) => errno::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => errno::SERVICE_UNAVAILABLE,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Unprocessable(msg)
            | ApiError::Internal(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let errno = self.errno();
        match &self {
            ApiError::NotFound(msg) => {
                tracing::warn!(errno, error = %msg, "Resource not found")
            }
            ApiError::BadRequest(msg) => tracing::warn!(errno, error = %msg, "Bad request"),
            ApiError::Conflict(msg) => tracing::warn!(errno, error = %msg, "Resource conflict"),
            ApiError::Unprocessable(msg) => {
                tracing::warn!(errno, error = %msg, "Unusable model output")
            }
            ApiError::Internal(msg) => {
                tracing::error!(errno, error = %msg, "Internal server error")
            }
            ApiError::BadGateway(msg) => tracing::error!(errno, error = %msg, "Generation failed"),
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!(errno, error = %msg, "Service unavailable")
            }
        }

        let response = ErrorResponse::new(errno, self.message());
        (StatusCode::OK, Json(response)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(msg) => ApiError::NotFound(msg),
            RepositoryError::Duplicate(msg) => ApiError::Conflict(msg),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        match e {
            ApplicationError::NotFound { resource_type, id } => {
                ApiError::NotFound(format!("{} not found: {}", resource_type, id))
            }
            ApplicationError::ValidationError(msg) => ApiError::BadRequest(msg),
            ApplicationError::NotConfigured(msg) => {
                ApiError::ServiceUnavailable(format!("Language model unavailable: {}", msg))
            }
            ApplicationError::Generation(cause) => {
                ApiError::BadGateway(format!("Generation failed: {}", cause))
            }
            ApplicationError::Parse { message, snippet } => {
                tracing::warn!(reason = %message, snippet = %snippet, "Model response rejected");
                ApiError::Unprocessable("Model response could not be parsed".to_string())
            }
            ApplicationError::Integrity(msg) => {
                ApiError::Unprocessable(format!("Generated storyline is inconsistent: {}", msg))
            }
            ApplicationError::RepositoryError(msg) => ApiError::Internal(msg),
            ApplicationError::InternalError(msg) => ApiError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::LlmError;

    #[test]
    fn test_taxonomy_errno_mapping() {
        let cases: Vec<(ApplicationError, i32)> = vec![
            (ApplicationError::NotConfigured("no key".into()), 503),
            (ApplicationError::Generation(LlmError::Timeout), 502),
            (ApplicationError::parse("bad json", "{oops"), 422),
            (ApplicationError::Integrity("dangling".into()), 422),
            (ApplicationError::validation("empty title"), 400),
            (ApplicationError::not_found("Storyline", uuid::Uuid::nil()), 404),
            (ApplicationError::internal("boom"), 500),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).errno(), expected);
        }
    }

    #[test]
    fn test_parse_details_not_returned() {
        let err = ApiError::from(ApplicationError::parse(
            "expected value at line 1 column 5",
            "SECRET MODEL OUTPUT",
        ));
        assert!(!err.message().contains("SECRET"));
        assert!(!err.message().contains("line 1 column 5"));
        assert_eq!(err.message(), "Model response could not be parsed");
    }

    #[test]
    fn test_duplicate_is_conflict() {
        let err = ApiError::from(RepositoryError::Duplicate("chapter 1".into()));
        assert_eq!(err.errno(), errno::CONFLICT);
    }
}
