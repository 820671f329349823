//! Storyforge - 小说创作辅助的文本生成服务
//!
//! 启动顺序：配置 → 日志 → 数据库 → 模型后端 → HTTP 服务

use std::sync::Arc;
use std::time::Duration;

use storyforge::application::GeneratorSettings;
use storyforge::config::{load_config, print_config};
use storyforge::infrastructure::adapters::{build_language_model, completion_options};
use storyforge::infrastructure::http::{AppState, HttpServer};
use storyforge::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteNovelRepository, SqliteStorylineRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},storyforge={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Storyforge - 小说创作生成服务");
    print_config(&config);

    // 确保数据目录存在
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    let novel_repo = Arc::new(SqliteNovelRepository::new(pool.clone()));
    let storyline_repo = Arc::new(SqliteStorylineRepository::new(pool));

    // 模型后端缺少凭据时服务照常启动，生成接口返回 503
    let llm = build_language_model(&config.llm);
    let settings = GeneratorSettings {
        options: completion_options(&config.llm),
        timeout: Duration::from_secs(config.generation.request_timeout_secs),
    };

    let state = AppState::new(llm, novel_repo, storyline_repo, settings);
    let server = HttpServer::new(config.server.clone(), state);

    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                return;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
