//! Scripted Language Model - 用于测试的模型
//!
//! 按顺序返回预设回复，不发出任何网络请求；记录调用次数和最近一次收到的消息。

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::application::ports::{
    segment_channel, ChatMessage, CompletionOptions, CompletionStream, LanguageModelPort, LlmError,
};

pub struct ScriptedLanguageModel {
    replies: Mutex<VecDeque<String>>,
    /// 流式调用的预设片段（包括中途失败）
    segments: Mutex<Option<Vec<Result<String, LlmError>>>>,
    failure: Option<LlmError>,
    delay: Duration,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl ScriptedLanguageModel {
    /// 每次调用依次返回一条回复
    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            segments: Mutex::new(None),
            failure: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// 流式调用按给定片段输出
    pub fn with_segments(segments: Vec<Result<String, LlmError>>) -> Self {
        let model = Self::with_replies(Vec::new());
        *model.segments.lock().unwrap_or_else(|e| e.into_inner()) = Some(segments);
        model
    }

    /// 每次调用都失败
    pub fn failing(error: LlmError) -> Self {
        Self {
            failure: Some(error),
            ..Self::with_replies(Vec::new())
        }
    }

    /// 每次调用（以及每个流式片段）之前等待
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, messages: &[ChatMessage]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap_or_else(|e| e.into_inner()) = messages.to_vec();
    }

    fn next_reply(&self) -> Result<String, LlmError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("no scripted reply left".to_string()))
    }
}

/// 按单词切分，保留空白，拼接后与原文一致
fn split_segments(reply: &str) -> Vec<Result<String, LlmError>> {
    reply
        .split_inclusive(' ')
        .map(|s| Ok(s.to_string()))
        .collect()
}

#[async_trait]
impl LanguageModelPort for ScriptedLanguageModel {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        self.record(messages);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next_reply()
    }

    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<CompletionStream, LlmError> {
        self.record(messages);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.segments.lock().unwrap_or_else(|e| e.into_inner()).take();
        let segments = match scripted {
            Some(segments) => segments,
            None => split_segments(&self.next_reply()?),
        };

        let delay = self.delay;
        let (tx, stream) = segment_channel(8);
        tokio::spawn(async move {
            for segment in segments {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let failed = segment.is_err();
                if tx.send(segment).await.is_err() || failed {
                    return;
                }
            }
        });
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_replies_in_order() {
        let model = ScriptedLanguageModel::with_replies(vec!["one".into(), "two".into()]);
        let options = CompletionOptions::default();
        assert_eq!(model.complete(&[], &options).await.unwrap(), "one");
        assert_eq!(model.complete(&[], &options).await.unwrap(), "two");
        assert!(model.complete(&[], &options).await.is_err());
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_stream_stops_after_error() {
        let model = ScriptedLanguageModel::with_segments(vec![
            Ok("A".into()),
            Err(LlmError::NetworkError("reset".into())),
            Ok("never".into()),
        ]);
        let items: Vec<Result<String, LlmError>> = model
            .complete_streaming(&[], &CompletionOptions::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }
}
