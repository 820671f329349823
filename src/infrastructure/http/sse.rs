//! Streaming Relay - 把模型片段流转发为 SSE
//!
//! 每个请求恰好产生一个终止帧：`done` 或 `error`。
//! 客户端断开时 axum 丢弃响应体，片段流随之被丢弃，
//! 适配器的读取任务观察到通道关闭后停止。

use axum::{
    http::{header, HeaderValue},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use futures_util::{stream, Stream, StreamExt};
use std::convert::Infallible;
use tokio::time::Instant;

use crate::application::CompletionStream;

/// 转发给客户端的帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Message(String),
    Done,
    Error(String),
}

impl RelayFrame {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayFrame::Message(_))
    }

    fn into_event(self) -> Event {
        match self {
            RelayFrame::Message(content) => Event::default()
                .event("message")
                .data(serde_json::json!({ "content": content }).to_string()),
            RelayFrame::Done => Event::default().event("done").data("[DONE]"),
            RelayFrame::Error(message) => Event::default().event("error").data(message),
        }
    }
}

struct RelayState {
    segments: CompletionStream,
    deadline: Instant,
    finished: bool,
}

/// 把片段流转换为帧流
///
/// `deadline` 是整个请求的截止时间，建立流时已经开始计时
pub fn relay_frames(
    segments: CompletionStream,
    deadline: Instant,
) -> impl Stream<Item = RelayFrame> + Send + 'static {
    let state = RelayState {
        segments,
        deadline,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        loop {
            let next = tokio::time::timeout_at(state.deadline, state.segments.next()).await;
            let frame = match next {
                Ok(Some(Ok(segment))) if segment.is_empty() => continue,
                Ok(Some(Ok(segment))) => RelayFrame::Message(segment),
                Ok(Some(Err(e))) => {
                    tracing::warn!(error = %e, "Stream interrupted by provider error");
                    RelayFrame::Error(e.to_string())
                }
                Ok(None) => RelayFrame::Done,
                Err(_) => {
                    tracing::warn!("Stream exceeded generation deadline");
                    RelayFrame::Error("generation timed out".to_string())
                }
            };

            state.finished = frame.is_terminal();
            return Some((frame, state));
        }
    })
}

/// 流未能建立时只有一个 `error` 帧
pub fn failed_frames(message: String) -> impl Stream<Item = RelayFrame> + Send + 'static {
    stream::once(async move { RelayFrame::Error(message) })
}

/// 渲染为 SSE 响应
pub fn into_sse_response<S>(frames: S) -> Response
where
    S: Stream<Item = RelayFrame> + Send + 'static,
{
    let events = frames.map(|frame| Ok::<_, Infallible>(frame.into_event()));
    let mut response = Sse::new(events).into_response();

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));

    response
}
