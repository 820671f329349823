//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                          GET   服务健康检查
//! - /api/llm/health                    GET   模型后端健康检查
//! - /api/generate/character            POST  生成角色
//! - /api/generate/character/refine     POST  修改角色描述
//! - /api/generate/plot                 POST  情节建议
//! - /api/generate/chapter              POST  生成章节
//! - /api/generate/chapter/summary      POST  章节摘要
//! - /api/generate/chapter/polish       POST  章节润色
//! - /api/generate/storyline            POST  生成故事线（不落库）
//! - /api/generate/setting              POST  世界观设定
//! - /api/generate/style                POST  文风指南
//! - /api/generate/style/analyze        POST  分析样文文风
//! - /api/generate/goals                POST  写作目标
//! - /api/stream/chapter                POST  流式章节（SSE）
//! - /api/stream/chat                   POST  流式对话（SSE）
//! - /api/storyline/*                   POST  故事线、节点、连接
//! - /api/novel/*                       POST  小说资料录入与概览

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/llm/health", get(handlers::llm_health))
        .nest("/generate", generate_routes())
        .nest("/stream", stream_routes())
        .nest("/storyline", storyline_routes())
        .nest("/novel", novel_routes())
}

/// Generate 路由
fn generate_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/character", post(handlers::generate_character))
        .route("/character/refine", post(handlers::refine_character))
        .route("/plot", post(handlers::generate_plot))
        .route("/chapter", post(handlers::generate_chapter))
        .route("/chapter/summary", post(handlers::summarize_chapter))
        .route("/chapter/polish", post(handlers::polish_chapter))
        .route("/storyline", post(handlers::generate_storyline))
        .route("/setting", post(handlers::generate_setting))
        .route("/style", post(handlers::generate_style))
        .route("/style/analyze", post(handlers::analyze_style))
        .route("/goals", post(handlers::suggest_goals))
}

/// Stream 路由
fn stream_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chapter", post(handlers::stream_chapter))
        .route("/chat", post(handlers::stream_chat))
}

/// Storyline 路由
fn storyline_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(handlers::create_storyline))
        .route("/update", post(handlers::update_storyline))
        .route("/delete", post(handlers::delete_storyline))
        .route("/get", post(handlers::get_storyline))
        .route("/meta", post(handlers::get_storyline_meta))
        .route("/list", post(handlers::list_storylines))
        .route("/accept", post(handlers::accept_storylines))
        .route("/node/create", post(handlers::create_node))
        .route("/node/update", post(handlers::update_node))
        .route("/node/delete", post(handlers::delete_node))
        .route("/connection/create", post(handlers::create_connection))
        .route("/connection/delete", post(handlers::delete_connection))
}

/// Novel 路由
fn novel_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(handlers::create_novel))
        .route("/get", post(handlers::get_novel))
        .route("/character/add", post(handlers::add_character))
        .route("/plot_point/add", post(handlers::add_plot_point))
        .route("/chapter/add", post(handlers::add_chapter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::util::ServiceExt;

    use crate::application::{GeneratorSettings, LanguageModelPort, LlmError};
    use crate::infrastructure::adapters::ScriptedLanguageModel;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteNovelRepository,
        SqliteStorylineRepository,
    };

    async fn test_app(llm: ScriptedLanguageModel) -> Router {
        test_app_with(llm, GeneratorSettings::default()).await
    }

    async fn test_app_with(llm: ScriptedLanguageModel, settings: GeneratorSettings) -> Router {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let llm: Arc<dyn LanguageModelPort> = Arc::new(llm);
        let state = AppState::new(
            llm,
            Arc::new(SqliteNovelRepository::new(pool.clone())),
            Arc::new(SqliteStorylineRepository::new(pool)),
            settings,
        );
        create_routes().with_state(Arc::new(state))
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> Value {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let app = test_app(ScriptedLanguageModel::with_replies(vec![])).await;
        let request = Request::builder().uri("/api/ping").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_generate_character() {
        let reply = r#"```json
{"name": "林远", "role": "protagonist", "personality": "沉稳", "background": "边城医师",
 "appearance": "瘦高", "motivation": "寻找失踪的师父", "arc": "从逃避到担当"}
```"#;
        let app = test_app(ScriptedLanguageModel::with_replies(vec![reply.to_string()])).await;

        let body = post_json(&app, "/api/generate/character", json!({ "role": "protagonist" })).await;
        assert_eq!(body["errno"], 0);
        assert_eq!(body["data"]["name"], "林远");
    }

    #[tokio::test]
    async fn test_unconfigured_model_maps_to_503() {
        let app = test_app(ScriptedLanguageModel::failing(LlmError::NotConfigured(
            "missing api key".into(),
        )))
        .await;

        let body = post_json(&app, "/api/generate/goals", json!({})).await;
        assert_eq!(body["errno"], 503);
        assert!(body["data"].is_null());

        // 流式调用在开始之前失败，仍返回 JSON 错误
        let body = post_json(
            &app,
            "/api/stream/chat",
            json!({ "messages": [{ "role": "user", "content": "hi" }] }),
        )
        .await;
        assert_eq!(body["errno"], 503);

        let body = post_json(&app, "/api/stream/chat", json!({ "messages": [] })).await;
        assert_eq!(body["errno"], 400);
    }

    async fn post_sse(app: &Router, uri: &str, body: Value) -> String {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_error_event() {
        let app = test_app(ScriptedLanguageModel::failing(LlmError::NetworkError(
            "connection refused".into(),
        )))
        .await;

        let body = post_sse(
            &app,
            "/api/stream/chapter",
            json!({ "title": "The Gate", "chapterNumber": 1 }),
        )
        .await;
        assert_eq!(body.matches("event: error").count(), 1);
        assert!(body.contains("connection refused"));
        assert!(!body.contains("event: done"));
    }

    #[tokio::test]
    async fn test_stream_deadline_covers_open_and_relay() {
        let settings = GeneratorSettings {
            timeout: Duration::from_millis(250),
            ..GeneratorSettings::default()
        };
        // 建立流和首个片段各等待 150ms
        let model = ScriptedLanguageModel::with_segments(vec![Ok("A".into())])
            .with_delay(Duration::from_millis(150));
        let app = test_app_with(model, settings).await;

        let body = post_sse(
            &app,
            "/api/stream/chat",
            json!({ "messages": [{ "role": "user", "content": "hi" }] }),
        )
        .await;
        assert!(!body.contains("event: message"));
        assert!(body.contains("event: error\ndata: generation timed out"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_maps_to_422() {
        let app = test_app(ScriptedLanguageModel::with_replies(vec![
            "I cannot produce JSON today.".to_string(),
        ]))
        .await;

        let body = post_json(&app, "/api/generate/character", json!({})).await;
        assert_eq!(body["errno"], 422);
        assert!(!body["error"].as_str().unwrap().contains("cannot produce JSON"));
    }

    #[tokio::test]
    async fn test_stream_chat_relays_segments() {
        let app = test_app(ScriptedLanguageModel::with_segments(vec![
            Ok("你".into()),
            Ok("好".into()),
        ]))
        .await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/stream/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "messages": [{ "role": "user", "content": "hi" }] }).to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(body.matches("event: message").count(), 2);
        assert!(body.ends_with("event: done\ndata: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_novel_catalog_flow() {
        let app = test_app(ScriptedLanguageModel::with_replies(vec![])).await;

        let body = post_json(&app, "/api/novel/create", json!({ "title": "雾城", "genre": "悬疑" })).await;
        assert_eq!(body["errno"], 0);
        let novel_id = body["data"]["id"].as_str().unwrap().to_string();

        let body = post_json(
            &app,
            "/api/novel/character/add",
            json!({ "novelId": novel_id, "name": "沈默", "description": "退休警探" }),
        )
        .await;
        assert_eq!(body["errno"], 0);

        let body = post_json(
            &app,
            "/api/novel/chapter/add",
            json!({ "novelId": novel_id, "chapterNumber": 1, "title": "雾起", "content": "夜里起了雾。" }),
        )
        .await;
        assert_eq!(body["errno"], 0);

        let body = post_json(&app, "/api/novel/get", json!({ "id": novel_id })).await;
        assert_eq!(body["errno"], 0);
        assert_eq!(body["data"]["novel"]["title"], "雾城");
        assert_eq!(body["data"]["characters"][0]["name"], "沈默");
        assert_eq!(body["data"]["recentChapters"][0]["chapterNumber"], 1);

        let body = post_json(&app, "/api/novel/get", json!({ "id": uuid::Uuid::new_v4() })).await;
        assert_eq!(body["errno"], 404);
    }

    #[tokio::test]
    async fn test_storyline_graph_flow() {
        let app = test_app(ScriptedLanguageModel::with_replies(vec![])).await;

        let body = post_json(&app, "/api/novel/create", json!({ "title": "雾城" })).await;
        let novel_id = body["data"]["id"].as_str().unwrap().to_string();

        let body = post_json(
            &app,
            "/api/storyline/create",
            json!({ "novelId": novel_id, "title": "主线", "type": "main" }),
        )
        .await;
        assert_eq!(body["errno"], 0);
        let storyline_id = body["data"]["id"].as_str().unwrap().to_string();

        let mut node_ids = Vec::new();
        for title in ["起", "承"] {
            let body = post_json(
                &app,
                "/api/storyline/node/create",
                json!({ "storylineId": storyline_id, "title": title, "chapterStart": 1, "chapterEnd": 3 }),
            )
            .await;
            assert_eq!(body["errno"], 0);
            node_ids.push(body["data"]["id"].as_str().unwrap().to_string());
        }

        let body = post_json(
            &app,
            "/api/storyline/connection/create",
            json!({ "fromNodeId": node_ids[0], "toNodeId": node_ids[1], "connectionType": "cause", "weight": 8 }),
        )
        .await;
        assert_eq!(body["errno"], 0);

        // 作者提交的权重越界直接拒绝
        let body = post_json(
            &app,
            "/api/storyline/connection/create",
            json!({ "fromNodeId": node_ids[0], "toNodeId": node_ids[1], "weight": 11 }),
        )
        .await;
        assert_eq!(body["errno"], 400);

        let body = post_json(&app, "/api/storyline/get", json!({ "id": storyline_id })).await;
        assert_eq!(body["errno"], 0);
        assert_eq!(body["data"]["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["connections"].as_array().unwrap().len(), 1);

        let body = post_json(&app, "/api/storyline/node/delete", json!({ "id": node_ids[0] })).await;
        assert_eq!(body["errno"], 0);

        let body = post_json(&app, "/api/storyline/get", json!({ "id": storyline_id })).await;
        assert_eq!(body["data"]["nodes"].as_array().unwrap().len(), 1);
        assert!(body["data"]["connections"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storyline_rejects_bad_input() {
        let app = test_app(ScriptedLanguageModel::with_replies(vec![])).await;

        let body = post_json(
            &app,
            "/api/storyline/node/create",
            json!({ "storylineId": uuid::Uuid::new_v4(), "title": "x", "nodeType": "cliffhanger" }),
        )
        .await;
        assert_eq!(body["errno"], 400);

        let body = post_json(
            &app,
            "/api/storyline/node/create",
            json!({ "storylineId": uuid::Uuid::new_v4(), "title": "x", "chapterStart": 5, "chapterEnd": 2 }),
        )
        .await;
        assert_eq!(body["errno"], 400);
    }

    #[tokio::test]
    async fn test_accept_generated_storylines() {
        let app = test_app(ScriptedLanguageModel::with_replies(vec![])).await;

        let body = post_json(&app, "/api/novel/create", json!({ "title": "雾城" })).await;
        let novel_id = body["data"]["id"].as_str().unwrap().to_string();

        let body = post_json(
            &app,
            "/api/storyline/accept",
            json!({
                "novelId": novel_id,
                "storylines": [
                    {
                        "title": "复仇",
                        "type": "unknown-kind",
                        "nodes": [{ "title": "血案" }, { "title": "追凶" }],
                        "connections": [{ "fromIndex": 0, "toIndex": 1, "weight": 42 }]
                    },
                    {
                        "title": "断线",
                        "nodes": [{ "title": "孤点" }],
                        "connections": [{ "fromIndex": 0, "toIndex": 7 }]
                    }
                ]
            }),
        )
        .await;
        assert_eq!(body["errno"], 0);

        let results = body["data"].as_array().unwrap();
        assert_eq!(results[0]["nodeCount"], 2);
        assert!(results[0]["error"].is_null());
        assert!(results[1]["storylineId"].is_null());
        assert!(results[1]["error"].is_string());

        let body = post_json(&app, "/api/storyline/list", json!({ "novelId": novel_id })).await;
        let storylines = body["data"].as_array().unwrap();
        assert_eq!(storylines.len(), 1);
        assert_eq!(storylines[0]["type"], "main");
    }

    #[tokio::test]
    async fn test_accepted_inverted_range_stays_readable() {
        let app = test_app(ScriptedLanguageModel::with_replies(vec![])).await;

        let body = post_json(&app, "/api/novel/create", json!({ "title": "雾城" })).await;
        let novel_id = body["data"]["id"].as_str().unwrap().to_string();

        let body = post_json(
            &app,
            "/api/storyline/accept",
            json!({
                "novelId": novel_id,
                "storylines": [{
                    "title": "复仇",
                    "nodes": [
                        { "title": "血案", "chapterRange": { "start": 10, "end": 2 } },
                        { "title": "追凶", "chapterRange": { "start": 3, "end": 5 } }
                    ]
                }]
            }),
        )
        .await;
        assert_eq!(body["errno"], 0);
        let storyline_id = body["data"][0]["storylineId"].as_str().unwrap().to_string();

        let body = post_json(&app, "/api/storyline/get", json!({ "id": storyline_id })).await;
        assert_eq!(body["errno"], 0);
        assert_eq!(body["data"]["nodes"].as_array().unwrap().len(), 2);
    }
}
