//! SQLite Database - 数据库连接和迁移

use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;

/// 数据库配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    pub database_url: String,
    /// 最大连接数
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./data/storyforge.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite:{}?mode=rwc", path.as_ref().display()),
            max_connections: 5,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

/// 数据库连接池
pub type DbPool = Pool<Sqlite>;

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    // 启用 WAL 模式，允许并发读写
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await?;

    // 设置 busy_timeout=5000ms，遇到锁时等待而不是立即失败
    sqlx::query("PRAGMA busy_timeout=5000")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA synchronous=NORMAL")
        .execute(&pool)
        .await?;

    tracing::info!(url = %config.database_url, "SQLite pool created with WAL mode and busy_timeout=5000ms");

    Ok(pool)
}

/// 建表语句，按依赖顺序执行
const MIGRATIONS: &[&str] = &[
    // 小说资料（上下文组装只读）
    r#"
    CREATE TABLE IF NOT EXISTS novels (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        genre TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        world_setting TEXT NOT NULL DEFAULT '',
        style_guide TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS characters (
        id TEXT PRIMARY KEY,
        novel_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        FOREIGN KEY (novel_id) REFERENCES novels(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS plot_points (
        id TEXT PRIMARY KEY,
        novel_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        FOREIGN KEY (novel_id) REFERENCES novels(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chapters (
        id TEXT PRIMARY KEY,
        novel_id TEXT NOT NULL,
        chapter_number INTEGER NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        summary TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        FOREIGN KEY (novel_id) REFERENCES novels(id) ON DELETE CASCADE,
        UNIQUE (novel_id, chapter_number)
    )
    "#,
    // 故事线图
    r#"
    CREATE TABLE IF NOT EXISTS storylines (
        id TEXT PRIMARY KEY,
        novel_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        storyline_type TEXT NOT NULL DEFAULT 'main',
        status TEXT NOT NULL DEFAULT 'active',
        priority INTEGER NOT NULL DEFAULT 0,
        color TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS story_nodes (
        id TEXT PRIMARY KEY,
        storyline_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        node_type TEXT NOT NULL DEFAULT 'event',
        position_x REAL NOT NULL DEFAULT 0,
        position_y REAL NOT NULL DEFAULT 0,
        chapter_start INTEGER,
        chapter_end INTEGER,
        character_ids TEXT NOT NULL DEFAULT '[]',
        plot_point_ids TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL DEFAULT 'planned',
        order_index INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (storyline_id) REFERENCES storylines(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS node_connections (
        id TEXT PRIMARY KEY,
        from_node_id TEXT NOT NULL,
        to_node_id TEXT NOT NULL,
        connection_type TEXT NOT NULL DEFAULT 'sequence',
        description TEXT NOT NULL DEFAULT '',
        weight INTEGER NOT NULL DEFAULT 5 CHECK (weight BETWEEN 1 AND 10),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        CHECK (from_node_id <> to_node_id),
        FOREIGN KEY (from_node_id) REFERENCES story_nodes(id) ON DELETE CASCADE,
        FOREIGN KEY (to_node_id) REFERENCES story_nodes(id) ON DELETE CASCADE
    )
    "#,
    // 索引
    "CREATE INDEX IF NOT EXISTS idx_characters_novel_id ON characters(novel_id)",
    "CREATE INDEX IF NOT EXISTS idx_plot_points_novel_id ON plot_points(novel_id)",
    "CREATE INDEX IF NOT EXISTS idx_chapters_novel_number ON chapters(novel_id, chapter_number)",
    "CREATE INDEX IF NOT EXISTS idx_storylines_novel_id ON storylines(novel_id)",
    "CREATE INDEX IF NOT EXISTS idx_story_nodes_storyline_id ON story_nodes(storyline_id, order_index)",
    "CREATE INDEX IF NOT EXISTS idx_node_connections_from ON node_connections(from_node_id)",
    "CREATE INDEX IF NOT EXISTS idx_node_connections_to ON node_connections(to_node_id)",
];

/// 运行数据库迁移
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    for statement in MIGRATIONS {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!(statements = MIGRATIONS.len(), "Database migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_db() {
        let config = DatabaseConfig::in_memory();
        let pool = create_pool(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        // 迁移可重复执行
        run_migrations(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_self_loop_rejected_by_schema() {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO node_connections (id, from_node_id, to_node_id, created_at, updated_at) VALUES ('c', 'n', 'n', '', '')",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
