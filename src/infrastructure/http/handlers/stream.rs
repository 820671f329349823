//! Streaming Handlers - SSE
//!
//! 调用模型之前的失败（未配置、参数错误、小说不存在）仍以 JSON 错误返回；
//! 模型调用本身失败时，无论发生在建立流还是读取片段，都以 `error` 事件结束。
//! 建立流与转发片段共用一个截止时间。

use axum::{extract::State, response::Response, Json};
use std::sync::Arc;
use tokio::time::Instant;

use crate::application::{ApplicationError, ChapterRequest, ChatRequest, CompletionStream, LlmError};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::sse::{failed_frames, into_sse_response, relay_frames};
use crate::infrastructure::http::state::AppState;

/// 流式生成章节正文
pub async fn stream_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChapterRequest>,
) -> Result<Response, ApiError> {
    tracing::info!(chapter = req.chapter_number, title = %req.title, "Chapter stream requested");

    let deadline = Instant::now() + state.stream_timeout;
    let opened = state.chapter_generator.stream(req, deadline).await;
    respond(opened, deadline)
}

/// 流式对话
pub async fn stream_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    tracing::info!(
        novel_id = ?req.novel_id,
        turns = req.messages.len(),
        "Chat stream requested"
    );

    let deadline = Instant::now() + state.stream_timeout;
    let opened = state.chat_generator.stream(req, deadline).await;
    respond(opened, deadline)
}

fn respond(
    opened: Result<CompletionStream, ApplicationError>,
    deadline: Instant,
) -> Result<Response, ApiError> {
    match opened {
        Ok(segments) => Ok(into_sse_response(relay_frames(segments, deadline))),
        Err(ApplicationError::Generation(e)) => {
            tracing::warn!(error = %e, "Stream could not be opened");
            let message = match e {
                LlmError::Timeout => "generation timed out".to_string(),
                other => other.to_string(),
            };
            Ok(into_sse_response(failed_frames(message)))
        }
        Err(e) => Err(e.into()),
    }
}
