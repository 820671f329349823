//! HTTP Layer - JSON API + SSE 流式输出

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sse;
pub mod state;

pub use error::ApiError;
pub use routes::create_routes;
pub use server::HttpServer;
pub use state::AppState;
