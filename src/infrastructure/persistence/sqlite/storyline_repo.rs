//! SQLite Storyline Repository
//!
//! 节点的 character_ids / plot_point_ids 以 JSON 数组存储。
//! 连接表不带 storyline_id，按起点节点归属查询。

use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::novel_repo::{db_error, parse_time, parse_uuid};
use super::DbPool;
use crate::application::ports::{RepositoryError, StorylineRepositoryPort};
use crate::domain::storyline::{
    ChapterRange, ConnectionType, NodeConnection, NodeStatus, NodeType, Position,
    ResolvedStoryline, StoryNode, Storyline, StorylineStatus, StorylineType, Weight,
};

/// SQLite Storyline Repository
pub struct SqliteStorylineRepository {
    pool: DbPool,
}

impl SqliteStorylineRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct StorylineRow {
    id: String,
    novel_id: String,
    title: String,
    description: String,
    storyline_type: String,
    status: String,
    priority: i64,
    color: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<StorylineRow> for Storyline {
    type Error = RepositoryError;

    fn try_from(row: StorylineRow) -> Result<Self, Self::Error> {
        Ok(Storyline {
            id: parse_uuid(&row.id)?,
            novel_id: parse_uuid(&row.novel_id)?,
            title: row.title,
            description: row.description,
            storyline_type: StorylineType::from_str(&row.storyline_type).unwrap_or_default(),
            status: StorylineStatus::from_str(&row.status).unwrap_or_default(),
            priority: row.priority as i32,
            color: row.color,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct NodeRow {
    id: String,
    storyline_id: String,
    title: String,
    description: String,
    node_type: String,
    position_x: f64,
    position_y: f64,
    chapter_start: Option<i64>,
    chapter_end: Option<i64>,
    character_ids: String,
    plot_point_ids: String,
    status: String,
    order_index: i64,
    created_at: String,
    updated_at: String,
}

fn parse_id_set(value: &str) -> Result<BTreeSet<Uuid>, RepositoryError> {
    serde_json::from_str(value).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

fn encode_id_set(ids: &BTreeSet<Uuid>) -> Result<String, RepositoryError> {
    serde_json::to_string(ids).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

impl TryFrom<NodeRow> for StoryNode {
    type Error = RepositoryError;

    fn try_from(row: NodeRow) -> Result<Self, Self::Error> {
        let chapter_range = match (row.chapter_start, row.chapter_end) {
            (Some(start), Some(end)) => Some(
                ChapterRange::new(start as u32, end as u32)
                    .map_err(|e| RepositoryError::SerializationError(e.to_string()))?,
            ),
            _ => None,
        };

        Ok(StoryNode {
            id: parse_uuid(&row.id)?,
            storyline_id: parse_uuid(&row.storyline_id)?,
            title: row.title,
            description: row.description,
            node_type: NodeType::from_str(&row.node_type).unwrap_or_default(),
            position: Position::new(row.position_x, row.position_y),
            chapter_range,
            character_ids: parse_id_set(&row.character_ids)?,
            plot_point_ids: parse_id_set(&row.plot_point_ids)?,
            status: NodeStatus::from_str(&row.status).unwrap_or_default(),
            order_index: row.order_index as i32,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct ConnectionRow {
    id: String,
    from_node_id: String,
    to_node_id: String,
    connection_type: String,
    description: String,
    weight: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ConnectionRow> for NodeConnection {
    type Error = RepositoryError;

    fn try_from(row: ConnectionRow) -> Result<Self, Self::Error> {
        NodeConnection::restore(
            parse_uuid(&row.id)?,
            parse_uuid(&row.from_node_id)?,
            parse_uuid(&row.to_node_id)?,
            ConnectionType::from_str(&row.connection_type).unwrap_or_default(),
            row.description,
            Weight::or_default(Some(row.weight)),
            parse_time(&row.created_at)?,
            parse_time(&row.updated_at)?,
        )
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
    }
}

const NODE_COLUMNS: &str = "id, storyline_id, title, description, node_type, position_x, position_y, \
     chapter_start, chapter_end, character_ids, plot_point_ids, status, order_index, created_at, updated_at";

const CONNECTION_COLUMNS: &str =
    "c.id, c.from_node_id, c.to_node_id, c.connection_type, c.description, c.weight, c.created_at, c.updated_at";

async fn upsert_storyline(
    conn: &mut SqliteConnection,
    storyline: &Storyline,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO storylines (id, novel_id, title, description, storyline_type, status, priority, color, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            storyline_type = excluded.storyline_type,
            status = excluded.status,
            priority = excluded.priority,
            color = excluded.color,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(storyline.id.to_string())
    .bind(storyline.novel_id.to_string())
    .bind(&storyline.title)
    .bind(&storyline.description)
    .bind(storyline.storyline_type.as_str())
    .bind(storyline.status.as_str())
    .bind(storyline.priority as i64)
    .bind(&storyline.color)
    .bind(storyline.created_at.to_rfc3339())
    .bind(storyline.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(())
}

async fn upsert_node(conn: &mut SqliteConnection, node: &StoryNode) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO story_nodes (id, storyline_id, title, description, node_type, position_x, position_y,
                                 chapter_start, chapter_end, character_ids, plot_point_ids, status,
                                 order_index, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            node_type = excluded.node_type,
            position_x = excluded.position_x,
            position_y = excluded.position_y,
            chapter_start = excluded.chapter_start,
            chapter_end = excluded.chapter_end,
            character_ids = excluded.character_ids,
            plot_point_ids = excluded.plot_point_ids,
            status = excluded.status,
            order_index = excluded.order_index,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(node.id.to_string())
    .bind(node.storyline_id.to_string())
    .bind(&node.title)
    .bind(&node.description)
    .bind(node.node_type.as_str())
    .bind(node.position.x)
    .bind(node.position.y)
    .bind(node.chapter_range.map(|r| r.start as i64))
    .bind(node.chapter_range.map(|r| r.end as i64))
    .bind(encode_id_set(&node.character_ids)?)
    .bind(encode_id_set(&node.plot_point_ids)?)
    .bind(node.status.as_str())
    .bind(node.order_index as i64)
    .bind(node.created_at.to_rfc3339())
    .bind(node.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(())
}

async fn upsert_connection(
    conn: &mut SqliteConnection,
    connection: &NodeConnection,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO node_connections (id, from_node_id, to_node_id, connection_type, description, weight, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            connection_type = excluded.connection_type,
            description = excluded.description,
            weight = excluded.weight,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(connection.id().to_string())
    .bind(connection.from_node_id().to_string())
    .bind(connection.to_node_id().to_string())
    .bind(connection.connection_type().as_str())
    .bind(connection.description())
    .bind(i64::from(connection.weight()))
    .bind(connection.created_at().to_rfc3339())
    .bind(connection.updated_at().to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;

    Ok(())
}

#[async_trait]
impl StorylineRepositoryPort for SqliteStorylineRepository {
    async fn save_graph(&self, graph: &ResolvedStoryline) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        upsert_storyline(&mut tx, &graph.storyline).await?;
        for node in &graph.nodes {
            upsert_node(&mut tx, node).await?;
        }
        for connection in &graph.connections {
            upsert_connection(&mut tx, connection).await?;
        }

        // 任一步失败时 tx 被 drop，自动回滚
        tx.commit().await.map_err(db_error)?;

        tracing::debug!(
            storyline_id = %graph.storyline.id,
            nodes = graph.nodes.len(),
            connections = graph.connections.len(),
            "Storyline graph saved"
        );
        Ok(())
    }

    async fn save_storyline(&self, storyline: &Storyline) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        upsert_storyline(&mut conn, storyline).await
    }

    async fn find_storyline(&self, id: Uuid) -> Result<Option<Storyline>, RepositoryError> {
        let row: Option<StorylineRow> = sqlx::query_as(
            r#"
            SELECT id, novel_id, title, description, storyline_type, status, priority, color, created_at, updated_at
            FROM storylines WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(Storyline::try_from).transpose()
    }

    async fn find_storylines_by_novel(&self, novel_id: Uuid) -> Result<Vec<Storyline>, RepositoryError> {
        let rows: Vec<StorylineRow> = sqlx::query_as(
            r#"
            SELECT id, novel_id, title, description, storyline_type, status, priority, color, created_at, updated_at
            FROM storylines WHERE novel_id = ?
            ORDER BY priority DESC, created_at ASC
            "#,
        )
        .bind(novel_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(Storyline::try_from).collect()
    }

    async fn delete_storyline(&self, id: Uuid) -> Result<(), RepositoryError> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            DELETE FROM node_connections
            WHERE from_node_id IN (SELECT id FROM story_nodes WHERE storyline_id = ?)
               OR to_node_id IN (SELECT id FROM story_nodes WHERE storyline_id = ?)
            "#,
        )
        .bind(&id)
        .bind(&id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM story_nodes WHERE storyline_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let result = sqlx::query("DELETE FROM storylines WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Storyline {}", id)));
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn save_node(&self, node: &StoryNode) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        upsert_node(&mut conn, node).await
    }

    async fn find_node(&self, id: Uuid) -> Result<Option<StoryNode>, RepositoryError> {
        let row: Option<NodeRow> =
            sqlx::query_as(&format!("SELECT {} FROM story_nodes WHERE id = ?", NODE_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

        row.map(StoryNode::try_from).transpose()
    }

    async fn find_nodes(&self, storyline_id: Uuid) -> Result<Vec<StoryNode>, RepositoryError> {
        let rows: Vec<NodeRow> = sqlx::query_as(&format!(
            "SELECT {} FROM story_nodes WHERE storyline_id = ? ORDER BY order_index ASC, created_at ASC",
            NODE_COLUMNS
        ))
        .bind(storyline_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(StoryNode::try_from).collect()
    }

    async fn delete_node(&self, id: Uuid) -> Result<(), RepositoryError> {
        let id = id.to_string();
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM node_connections WHERE from_node_id = ? OR to_node_id = ?")
            .bind(&id)
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        let result = sqlx::query("DELETE FROM story_nodes WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Story node {}", id)));
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn save_connection(&self, connection: &NodeConnection) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        upsert_connection(&mut conn, connection).await
    }

    async fn find_connection(&self, id: Uuid) -> Result<Option<NodeConnection>, RepositoryError> {
        let row: Option<ConnectionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM node_connections c WHERE c.id = ?",
            CONNECTION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(NodeConnection::try_from).transpose()
    }

    async fn find_connections(&self, storyline_id: Uuid) -> Result<Vec<NodeConnection>, RepositoryError> {
        let rows: Vec<ConnectionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM node_connections c
            JOIN story_nodes n ON n.id = c.from_node_id
            WHERE n.storyline_id = ?
            ORDER BY c.created_at ASC
            "#,
            CONNECTION_COLUMNS
        ))
        .bind(storyline_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(NodeConnection::try_from).collect()
    }

    async fn delete_connection(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM node_connections WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Connection {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    async fn repo() -> SqliteStorylineRepository {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteStorylineRepository::new(pool)
    }

    fn graph(node_count: usize) -> ResolvedStoryline {
        let storyline = Storyline::new(Uuid::new_v4(), "Exile", "", StorylineType::Main).unwrap();
        let nodes: Vec<StoryNode> = (0..node_count)
            .map(|i| {
                let mut node =
                    StoryNode::new(storyline.id, format!("Beat {}", i), NodeType::Event, i as i32)
                        .unwrap();
                node.character_ids.insert(Uuid::new_v4());
                node.chapter_range = Some(ChapterRange::new(1, 2).unwrap());
                node
            })
            .collect();
        let connections = nodes
            .windows(2)
            .map(|pair| {
                NodeConnection::new(
                    pair[0].id,
                    pair[1].id,
                    ConnectionType::Sequence,
                    "",
                    Weight::DEFAULT,
                )
                .unwrap()
            })
            .collect();
        ResolvedStoryline {
            storyline,
            nodes,
            connections,
        }
    }

    #[tokio::test]
    async fn test_save_graph_round_trip() {
        let repo = repo().await;
        let graph = graph(3);
        repo.save_graph(&graph).await.unwrap();

        let nodes = repo.find_nodes(graph.storyline.id).await.unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].character_ids, graph.nodes[0].character_ids);
        assert_eq!(nodes[1].chapter_range, Some(ChapterRange::new(1, 2).unwrap()));

        let connections = repo.find_connections(graph.storyline.id).await.unwrap();
        assert_eq!(connections.len(), 2);
        assert_eq!(connections[0].weight(), Weight::DEFAULT);
    }

    #[tokio::test]
    async fn test_save_graph_rolls_back_on_failure() {
        let repo = repo().await;
        let mut graph = graph(2);
        // 指向不存在节点的连接会触发外键失败
        graph.connections.push(
            NodeConnection::new(
                graph.nodes[0].id,
                Uuid::new_v4(),
                ConnectionType::Cause,
                "",
                Weight::DEFAULT,
            )
            .unwrap(),
        );

        assert!(repo.save_graph(&graph).await.is_err());
        assert!(repo.find_storyline(graph.storyline.id).await.unwrap().is_none());
        assert!(repo.find_nodes(graph.storyline.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_storyline_cascades() {
        let repo = repo().await;
        let graph = graph(3);
        repo.save_graph(&graph).await.unwrap();

        repo.delete_storyline(graph.storyline.id).await.unwrap();

        assert!(repo.find_nodes(graph.storyline.id).await.unwrap().is_empty());
        let conn_id = graph.connections[0].id();
        assert!(repo.find_connection(conn_id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete_storyline(graph.storyline.id).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_node_removes_its_connections() {
        let repo = repo().await;
        let graph = graph(3);
        repo.save_graph(&graph).await.unwrap();

        repo.delete_node(graph.nodes[1].id).await.unwrap();

        assert!(repo.find_connections(graph.storyline.id).await.unwrap().is_empty());
        assert_eq!(repo.find_nodes(graph.storyline.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_storylines_by_novel() {
        let repo = repo().await;
        let first = graph(2);
        let mut second = graph(2);
        second.storyline.novel_id = first.storyline.novel_id;
        second.storyline.priority = 3;
        repo.save_graph(&first).await.unwrap();
        repo.save_graph(&second).await.unwrap();

        let lines = repo
            .find_storylines_by_novel(first.storyline.novel_id)
            .await
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].id, second.storyline.id);
    }
}
