//! HTTP Server
//!
//! 组装路由与中间件，绑定监听地址，Ctrl-C 时优雅关闭

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::Router;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::middleware::error_logging_middleware;
use super::routes::create_routes;
use super::state::AppState;
use crate::config::ServerConfig;

/// HTTP 服务器
pub struct HttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// 带全部中间件的 Router
    pub fn router(&self) -> Router {
        // 前端与服务分开部署，允许任意来源
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .expose_headers(Any)
            .max_age(Duration::from_secs(3600));

        create_routes()
            .layer(middleware::from_fn(error_logging_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// 启动服务器，`shutdown_signal` 完成后停止接收新连接
    pub async fn run_with_shutdown<F>(self, shutdown_signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let addr = self.config.addr();

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(addr = %addr, provider = self.state.llm.provider_name(), "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    use crate::application::GeneratorSettings;
    use crate::infrastructure::adapters::UnconfiguredLanguageModel;
    use crate::infrastructure::persistence::sqlite::{
        create_pool, run_migrations, DatabaseConfig, SqliteNovelRepository,
        SqliteStorylineRepository,
    };

    async fn test_server() -> HttpServer {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let state = AppState::new(
            Arc::new(UnconfiguredLanguageModel::new("missing api key")),
            Arc::new(SqliteNovelRepository::new(pool.clone())),
            Arc::new(SqliteStorylineRepository::new(pool)),
            GeneratorSettings::default(),
        );
        HttpServer::new(ServerConfig::default(), state)
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let router = test_server().await.router();
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/generate/chapter")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let router = test_server().await.router();
        let request = Request::builder()
            .uri("/api/novel/list")
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
