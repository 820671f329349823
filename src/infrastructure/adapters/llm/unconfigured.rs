//! Unconfigured Language Model
//!
//! 模型后端缺少必要配置时的占位实现：服务照常启动，
//! 每次调用都在发出任何网络请求之前返回 NotConfigured。

use async_trait::async_trait;

use crate::application::ports::{
    ChatMessage, CompletionOptions, CompletionStream, LanguageModelPort, LlmError,
};

pub struct UnconfiguredLanguageModel {
    reason: String,
}

impl UnconfiguredLanguageModel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl LanguageModelPort for UnconfiguredLanguageModel {
    fn provider_name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured(self.reason.clone()))
    }

    async fn complete_streaming(
        &self,
        _messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<CompletionStream, LlmError> {
        Err(LlmError::NotConfigured(self.reason.clone()))
    }

    async fn health_check(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_call_is_not_configured() {
        let model = UnconfiguredLanguageModel::new("missing api key");
        let options = CompletionOptions::default();

        let err = model.complete(&[ChatMessage::user("hi")], &options).await.unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(ref r) if r == "missing api key"));
        assert!(model.complete_streaming(&[], &options).await.is_err());
        assert!(!model.health_check().await);
    }
}
