//! Ping Handler
//!
//! 服务与模型后端的健康检查

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::infrastructure::http::dto::ApiResponse;
use crate::infrastructure::http::state::AppState;

/// Ping 响应
#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Ping endpoint - 健康检查
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// 模型后端状态
#[derive(Serialize)]
pub struct LlmHealthResponse {
    pub provider: String,
    pub available: bool,
}

/// 探测模型后端是否可达
pub async fn llm_health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<LlmHealthResponse>> {
    let available = state.llm.health_check().await;
    if !available {
        tracing::warn!(provider = state.llm.provider_name(), "Language model health check failed");
    }

    Json(ApiResponse::success(LlmHealthResponse {
        provider: state.llm.provider_name().to_string(),
        available,
    }))
}
