//! HTTP Middleware
//!
//! HTTP 状态码错误日志中间件

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};

/// 传输层 4xx/5xx（路由不存在、请求体无法反序列化等）在这里记录，
/// 业务错误（errno != 0）的 HTTP 状态仍是 200，在 `ApiError::into_response` 中记录
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP client error"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        routing::{get, post},
        Json, Router,
    };
    use tower::util::ServiceExt;

    async fn echo(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
        Json(body)
    }

    async fn upstream_down() -> StatusCode {
        StatusCode::BAD_GATEWAY
    }

    fn create_test_router() -> Router {
        Router::new()
            .route("/echo", post(echo))
            .route("/upstream", get(upstream_down))
            .layer(axum::middleware::from_fn(error_logging_middleware))
    }

    fn json_request(uri: &str, body: &'static str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_passes_successful_response_through() {
        let response = create_test_router()
            .oneshot(json_request("/echo", r#"{"title":"雾起"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_body_is_client_error() {
        let response = create_test_router()
            .oneshot(json_request("/echo", "{not json"))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_server_error_status_preserved() {
        let request = HttpRequest::builder()
            .uri("/upstream")
            .body(Body::empty())
            .unwrap();

        let response = create_test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
