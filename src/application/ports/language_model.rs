//! Language Model Port - 语言模型抽象
//!
//! 定义批量补全与流式补全的抽象接口，具体实现在 infrastructure/adapters 层。
//! 流式补全返回一个由 mpsc 通道驱动的 Stream：通道耗尽即完成，
//! 消费方丢弃 Stream 即放弃底层调用。

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;

/// 语言模型错误
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("Language model is not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Provider returned HTTP {status}: {body}")]
    ServiceError { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// 带角色标记的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// 补全参数
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    /// 为空时使用适配器配置的模型
    pub model: Option<String>,
    /// [0, 2]
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// 流式补全的片段序列
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// 片段发送端
pub type SegmentSender = mpsc::Sender<Result<String, LlmError>>;

/// 创建通道驱动的片段流
///
/// 返回的发送端在接收端被丢弃后 `send` 会失败，生产方据此停止读取。
pub fn segment_channel(buffer: usize) -> (SegmentSender, CompletionStream) {
    let (tx, rx) = mpsc::channel(buffer);
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    (tx, Box::pin(stream))
}

/// Language Model Port
#[async_trait]
pub trait LanguageModelPort: Send + Sync {
    /// 提供方名称（用于日志）
    fn provider_name(&self) -> &str;

    /// 批量补全，返回完整文本
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;

    /// 流式补全，按提供方顺序返回片段
    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionStream, LlmError>;

    /// 检查模型服务是否可用
    async fn health_check(&self) -> bool {
        true
    }
}

/// 回调形式的流式补全：每个片段调用一次 `on_segment`，返回拼接后的全文
pub async fn complete_with_callback<F>(
    model: &dyn LanguageModelPort,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    mut on_segment: F,
) -> Result<String, LlmError>
where
    F: FnMut(&str) + Send,
{
    let mut stream = model.complete_streaming(messages, options).await?;
    let mut full = String::new();

    while let Some(segment) = stream.next().await {
        let segment = segment?;
        on_segment(&segment);
        full.push_str(&segment);
    }

    Ok(full)
}
