//! HTTP Language Model - 调用外部模型服务
//!
//! 实现 LanguageModelPort trait，支持两类后端：
//!
//! Hosted（OpenAI 兼容，需要 API key）:
//! POST {base_url}/chat/completions
//! Request: {"model", "messages", "temperature", "max_tokens", "stream"}
//! 流式响应为 SSE：`data: {"choices":[{"delta":{"content":"..."}}]}`，以 `data: [DONE]` 结束
//!
//! Local（Ollama 兼容，无需凭证）:
//! POST {base_url}/api/chat
//! Request: {"model", "messages", "stream", "options": {"temperature", "num_predict"}}
//! 流式响应为 NDJSON：`{"message":{"content":"..."},"done":false}`

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::application::ports::{
    segment_channel, ChatMessage, CompletionOptions, CompletionStream, LanguageModelPort, LlmError,
};

/// 错误响应体只保留前若干字符
const ERROR_BODY_CHARS: usize = 500;
/// 流式通道缓冲
const SEGMENT_BUFFER: usize = 64;

/// 模型后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI 兼容的托管服务
    Hosted,
    /// Ollama 兼容的本地服务
    Local,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Hosted => "hosted",
            ProviderKind::Local => "local",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" | "openai" => Some(ProviderKind::Hosted),
            "local" | "ollama" => Some(ProviderKind::Local),
            _ => None,
        }
    }
}

/// HTTP 模型客户端配置
#[derive(Debug, Clone)]
pub struct HttpLanguageModelConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    /// Hosted 必需，Local 忽略
    pub api_key: Option<String>,
    pub model: String,
    /// 批量请求超时（秒）
    pub timeout_secs: u64,
}

impl HttpLanguageModelConfig {
    #[cfg(test)]
    pub fn hosted(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Hosted,
            base_url: base_url.into(),
            api_key: Some(api_key.into()),
            model: model.into(),
            timeout_secs: 120,
        }
    }

    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Local,
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            timeout_secs: 300,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct HostedRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct LocalOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize)]
struct LocalRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    options: LocalOptions,
}

#[derive(Debug, Default, Deserialize)]
struct WireContent {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HostedChoice {
    #[serde(default)]
    message: Option<WireContent>,
    #[serde(default)]
    delta: Option<WireContent>,
}

#[derive(Debug, Deserialize)]
struct HostedResponse {
    #[serde(default)]
    choices: Vec<HostedChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LocalResponse {
    #[serde(default)]
    message: Option<WireContent>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

fn map_transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else if e.is_connect() {
        LlmError::NetworkError(format!("Cannot connect to model service: {}", e))
    } else {
        LlmError::NetworkError(e.to_string())
    }
}

/// 流式响应中的一行解析结果：(片段, 是否结束)
type StreamLine = (Option<String>, bool);

/// SSE 行：`data: {...}` / `data: [DONE]`，其他行忽略
fn parse_sse_line(line: &str) -> Result<StreamLine, LlmError> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok((None, false));
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok((None, true));
    }
    if payload.is_empty() {
        return Ok((None, false));
    }

    let chunk: HostedResponse = serde_json::from_str(payload)
        .map_err(|e| LlmError::InvalidResponse(format!("Malformed stream chunk: {}", e)))?;
    if let Some(error) = chunk.error {
        return Err(LlmError::InvalidResponse(error.to_string()));
    }

    let segment = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.or(c.message))
        .and_then(|m| m.content)
        .filter(|s| !s.is_empty());
    Ok((segment, false))
}

/// NDJSON 行：每行一个对象，`done: true` 结束
fn parse_ndjson_line(line: &str) -> Result<StreamLine, LlmError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok((None, false));
    }

    let chunk: LocalResponse = serde_json::from_str(line)
        .map_err(|e| LlmError::InvalidResponse(format!("Malformed stream chunk: {}", e)))?;
    if let Some(error) = chunk.error {
        return Err(LlmError::InvalidResponse(error));
    }

    let segment = chunk
        .message
        .and_then(|m| m.content)
        .filter(|s| !s.is_empty());
    Ok((segment, chunk.done))
}

/// HTTP 模型客户端
pub struct HttpLanguageModel {
    client: Client,
    config: HttpLanguageModelConfig,
}

impl HttpLanguageModel {
    /// 创建客户端；Hosted 缺少 API key 时返回 NotConfigured
    pub fn new(config: HttpLanguageModelConfig) -> Result<Self, LlmError> {
        if config.kind == ProviderKind::Hosted
            && config.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(LlmError::NotConfigured("hosted provider requires an api_key".to_string()));
        }
        if config.base_url.trim().is_empty() {
            return Err(LlmError::NotConfigured("base_url is empty".to_string()));
        }

        // 不设置整体超时：流式响应可能持续很久，批量请求单独设置
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn kind(&self) -> ProviderKind {
        self.config.kind
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// 获取对话 URL
    fn chat_url(&self) -> String {
        match self.config.kind {
            ProviderKind::Hosted => format!("{}/chat/completions", self.base_url()),
            ProviderKind::Local => format!("{}/api/chat", self.base_url()),
        }
    }

    /// 获取健康检查 URL
    fn health_url(&self) -> String {
        match self.config.kind {
            ProviderKind::Hosted => format!("{}/models", self.base_url()),
            ProviderKind::Local => format!("{}/api/tags", self.base_url()),
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (self.config.kind, self.config.api_key.as_deref()) {
            (ProviderKind::Hosted, Some(key)) => request.bearer_auth(key),
            _ => request,
        }
    }

    fn request_body(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        stream: bool,
    ) -> Result<serde_json::Value, LlmError> {
        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let wire: Vec<WireMessage<'_>> = messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();

        let body = match self.config.kind {
            ProviderKind::Hosted => serde_json::to_value(HostedRequest {
                model,
                messages: wire,
                temperature: options.temperature,
                max_tokens: options.max_tokens,
                stream,
            }),
            ProviderKind::Local => serde_json::to_value(LocalRequest {
                model,
                messages: wire,
                stream,
                options: LocalOptions {
                    temperature: options.temperature,
                    num_predict: options.max_tokens,
                },
            }),
        };
        body.map_err(|e| LlmError::InvalidResponse(format!("Failed to encode request: {}", e)))
    }

    async fn send(&self, body: &serde_json::Value, timeout: Option<Duration>) -> Result<Response, LlmError> {
        tracing::debug!(
            url = %self.chat_url(),
            provider = self.config.kind.as_str(),
            model = %self.config.model,
            "Sending model request"
        );

        let mut request = self.authorize(self.client.post(self.chat_url())).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ServiceError {
                status: status.as_u16(),
                body: truncate(&body, ERROR_BODY_CHARS),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LanguageModelPort for HttpLanguageModel {
    fn provider_name(&self) -> &str {
        self.config.kind.as_str()
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let body = self.request_body(messages, options, false)?;
        let response = self
            .send(&body, Some(Duration::from_secs(self.config.timeout_secs)))
            .await?;

        let text = response.text().await.map_err(map_transport_error)?;
        let content = match self.config.kind {
            ProviderKind::Hosted => {
                let parsed: HostedResponse = serde_json::from_str(&text)
                    .map_err(|e| LlmError::InvalidResponse(format!("Malformed completion: {}", e)))?;
                if let Some(error) = parsed.error {
                    return Err(LlmError::InvalidResponse(error.to_string()));
                }
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message)
                    .and_then(|m| m.content)
            }
            ProviderKind::Local => {
                let parsed: LocalResponse = serde_json::from_str(&text)
                    .map_err(|e| LlmError::InvalidResponse(format!("Malformed completion: {}", e)))?;
                if let Some(error) = parsed.error {
                    return Err(LlmError::InvalidResponse(error));
                }
                parsed.message.and_then(|m| m.content)
            }
        };

        let content = content.ok_or_else(|| LlmError::InvalidResponse("Completion has no content".to_string()))?;

        tracing::info!(
            provider = self.config.kind.as_str(),
            chars = content.chars().count(),
            "Model completion received"
        );
        Ok(content)
    }

    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionStream, LlmError> {
        let body = self.request_body(messages, options, true)?;
        let response = self.send(&body, None).await?;

        let kind = self.config.kind;
        let (tx, stream) = segment_channel(SEGMENT_BUFFER);

        tokio::spawn(async move {
            let bytes = Box::pin(
                response
                    .bytes_stream()
                    .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))),
            );
            let mut lines = StreamReader::new(bytes).lines();
            let mut segments = 0usize;

            loop {
                let line = tokio::select! {
                    _ = tx.closed() => {
                        tracing::debug!(provider = kind.as_str(), segments, "Stream consumer gone, abandoning model call");
                        return;
                    }
                    line = lines.next_line() => line,
                };

                let parsed = match line {
                    Ok(Some(line)) => match kind {
                        ProviderKind::Hosted => parse_sse_line(&line),
                        ProviderKind::Local => parse_ndjson_line(&line),
                    },
                    // 连接正常结束
                    Ok(None) => return,
                    Err(e) => Err(LlmError::NetworkError(e.to_string())),
                };

                match parsed {
                    Ok((segment, done)) => {
                        if let Some(segment) = segment {
                            segments += 1;
                            if tx.send(Ok(segment)).await.is_err() {
                                return;
                            }
                        }
                        if done {
                            tracing::debug!(provider = kind.as_str(), segments, "Model stream finished");
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(provider = kind.as_str(), error = %e, "Model stream failed");
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        Ok(stream)
    }

    async fn health_check(&self) -> bool {
        match self
            .authorize(self.client.get(self.health_url()))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};

    #[test]
    fn test_hosted_requires_api_key() {
        let mut config = HttpLanguageModelConfig::hosted("https://api.example.com/v1", "", "gpt-4o-mini");
        assert!(matches!(HttpLanguageModel::new(config.clone()), Err(LlmError::NotConfigured(_))));
        config.api_key = None;
        assert!(matches!(HttpLanguageModel::new(config), Err(LlmError::NotConfigured(_))));
    }

    #[test]
    fn test_local_needs_no_credentials() {
        let model = HttpLanguageModel::new(HttpLanguageModelConfig::local("http://localhost:11434/", "llama3")).unwrap();
        assert_eq!(model.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(model.provider_name(), "local");
    }

    #[test]
    fn test_request_body_shapes() {
        let messages = vec![ChatMessage::user("hi")];
        let options = CompletionOptions::default().with_max_tokens(256);

        let hosted = HttpLanguageModel::new(HttpLanguageModelConfig::hosted("http://h", "k", "m")).unwrap();
        let body = hosted.request_body(&messages, &options, true).unwrap();
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");

        let local = HttpLanguageModel::new(HttpLanguageModelConfig::local("http://l", "m")).unwrap();
        let body = local.request_body(&messages, &options, false).unwrap();
        assert_eq!(body["options"]["num_predict"], 256);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_sse_lines() {
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap(),
            (Some("Hel".to_string()), false)
        );
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), (None, true));
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), (None, false));
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            (None, false)
        );
        assert!(parse_sse_line("data: {broken").is_err());
    }

    #[test]
    fn test_parse_ndjson_lines() {
        assert_eq!(
            parse_ndjson_line(r#"{"message":{"role":"assistant","content":"lo"},"done":false}"#).unwrap(),
            (Some("lo".to_string()), false)
        );
        assert_eq!(
            parse_ndjson_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#).unwrap(),
            (None, true)
        );
        assert!(parse_ndjson_line(r#"{"error":"model not found"}"#).is_err());
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_hosted_streaming_against_local_server() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n\n\
data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\n\n\
data: [DONE]\n\n"
            }),
        );
        let base = serve(router).await;
        let model = HttpLanguageModel::new(HttpLanguageModelConfig::hosted(format!("{}/v1", base), "k", "m")).unwrap();

        let stream = model
            .complete_streaming(&[ChatMessage::user("hi")], &CompletionOptions::default())
            .await
            .unwrap();
        let segments: Vec<String> = stream.map(|s| s.unwrap()).collect().await;
        assert_eq!(segments, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_local_completion_and_error_status() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async { r#"{"message":{"role":"assistant","content":"Once upon a time"},"done":true}"# }),
        );
        let base = serve(router).await;
        let model = HttpLanguageModel::new(HttpLanguageModelConfig::local(base.clone(), "llama3")).unwrap();
        let text = model
            .complete(&[ChatMessage::user("begin")], &CompletionOptions::default())
            .await
            .unwrap();
        assert_eq!(text, "Once upon a time");

        // 不存在的路由返回 404
        let wrong = HttpLanguageModel::new(HttpLanguageModelConfig::hosted(base, "k", "m")).unwrap();
        let err = wrong
            .complete(&[ChatMessage::user("begin")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ServiceError { status: 404, .. }));
    }
}
