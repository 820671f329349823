//! LLM Adapter - 语言模型后端实现
//!
//! - HttpLanguageModel: Hosted（OpenAI 兼容）与 Local（Ollama 兼容）
//! - UnconfiguredLanguageModel: 缺少凭证时的占位实现
//! - ScriptedLanguageModel: 进程内脚本化实现，供测试使用

mod http_language_model;
mod scripted;
mod unconfigured;

pub use http_language_model::{HttpLanguageModel, HttpLanguageModelConfig, ProviderKind};
pub use scripted::ScriptedLanguageModel;
pub use unconfigured::UnconfiguredLanguageModel;

use std::sync::Arc;

use crate::application::ports::{CompletionOptions, LanguageModelPort, LlmError};
use crate::config::LlmConfig;

/// 把配置翻译为 HTTP 客户端配置
pub fn http_config(config: &LlmConfig) -> Result<HttpLanguageModelConfig, LlmError> {
    let kind = ProviderKind::from_str(&config.provider).ok_or_else(|| {
        LlmError::NotConfigured(format!("unknown provider '{}'", config.provider))
    })?;

    let http = match kind {
        ProviderKind::Hosted => HttpLanguageModelConfig {
            kind,
            base_url: config.hosted.base_url.clone(),
            api_key: config.hosted.api_key.clone(),
            model: config.hosted.model.clone(),
            timeout_secs: config.timeout_secs,
        },
        ProviderKind::Local => HttpLanguageModelConfig::local(
            config.local.base_url.clone(),
            config.local.model.clone(),
        )
        .with_timeout(config.timeout_secs),
    };
    Ok(http)
}

/// 根据配置构建模型后端
///
/// 配置不完整时返回 UnconfiguredLanguageModel，服务仍然启动
pub fn build_language_model(config: &LlmConfig) -> Arc<dyn LanguageModelPort> {
    match http_config(config).and_then(HttpLanguageModel::new) {
        Ok(model) => {
            tracing::info!(provider = model.kind().as_str(), "Language model configured");
            Arc::new(model)
        }
        Err(LlmError::NotConfigured(reason)) => {
            tracing::warn!(reason = %reason, "Language model not configured, generation disabled");
            Arc::new(UnconfiguredLanguageModel::new(reason))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build language model client");
            Arc::new(UnconfiguredLanguageModel::new(e.to_string()))
        }
    }
}

/// 生成器共用的补全参数
pub fn completion_options(config: &LlmConfig) -> CompletionOptions {
    let options = CompletionOptions::default().with_temperature(config.temperature);
    match config.max_tokens {
        Some(max_tokens) => options.with_max_tokens(max_tokens),
        None => options,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_builds_unconfigured_model() {
        let config = LlmConfig::default();
        let model = build_language_model(&config);
        assert_eq!(model.provider_name(), "unconfigured");

        let err = model
            .complete(&[crate::application::ports::ChatMessage::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::NotConfigured(_)));
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let mut config = LlmConfig::default();
        config.provider = "local".to_string();
        let model = build_language_model(&config);
        assert_eq!(model.provider_name(), "local");
    }

    #[test]
    fn test_completion_options_from_config() {
        let mut config = LlmConfig::default();
        config.temperature = 1.2;
        config.max_tokens = Some(4096);
        let options = completion_options(&config);
        assert!((options.temperature - 1.2).abs() < f32::EPSILON);
        assert_eq!(options.max_tokens, Some(4096));
        assert!(options.model.is_none());
    }
}
