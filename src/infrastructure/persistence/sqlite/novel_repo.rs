//! SQLite Novel Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{
    ChapterRecord, CharacterRecord, NovelRecord, NovelRepositoryPort, PlotPointRecord,
    RepositoryError,
};

/// SQLite Novel Repository
pub struct SqliteNovelRepository {
    pool: DbPool,
}

impl SqliteNovelRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(super) fn parse_uuid(value: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(value).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

pub(super) fn parse_time(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

pub(super) fn db_error(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Duplicate(db.message().to_string())
        }
        _ => RepositoryError::DatabaseError(e.to_string()),
    }
}

#[derive(FromRow)]
struct NovelRow {
    id: String,
    title: String,
    genre: String,
    description: String,
    world_setting: String,
    style_guide: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<NovelRow> for NovelRecord {
    type Error = RepositoryError;

    fn try_from(row: NovelRow) -> Result<Self, Self::Error> {
        Ok(NovelRecord {
            id: parse_uuid(&row.id)?,
            title: row.title,
            genre: row.genre,
            description: row.description,
            world_setting: row.world_setting,
            style_guide: row.style_guide,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct CharacterRow {
    id: String,
    novel_id: String,
    name: String,
    description: String,
}

impl TryFrom<CharacterRow> for CharacterRecord {
    type Error = RepositoryError;

    fn try_from(row: CharacterRow) -> Result<Self, Self::Error> {
        Ok(CharacterRecord {
            id: parse_uuid(&row.id)?,
            novel_id: parse_uuid(&row.novel_id)?,
            name: row.name,
            description: row.description,
        })
    }
}

#[derive(FromRow)]
struct PlotPointRow {
    id: String,
    novel_id: String,
    title: String,
    description: String,
}

impl TryFrom<PlotPointRow> for PlotPointRecord {
    type Error = RepositoryError;

    fn try_from(row: PlotPointRow) -> Result<Self, Self::Error> {
        Ok(PlotPointRecord {
            id: parse_uuid(&row.id)?,
            novel_id: parse_uuid(&row.novel_id)?,
            title: row.title,
            description: row.description,
        })
    }
}

#[derive(FromRow)]
struct ChapterRow {
    id: String,
    novel_id: String,
    chapter_number: i64,
    title: String,
    content: String,
    summary: String,
    created_at: String,
}

impl TryFrom<ChapterRow> for ChapterRecord {
    type Error = RepositoryError;

    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        Ok(ChapterRecord {
            id: parse_uuid(&row.id)?,
            novel_id: parse_uuid(&row.novel_id)?,
            chapter_number: row.chapter_number as u32,
            title: row.title,
            content: row.content,
            summary: row.summary,
            created_at: parse_time(&row.created_at)?,
        })
    }
}

#[async_trait]
impl NovelRepositoryPort for SqliteNovelRepository {
    async fn save_novel(&self, novel: &NovelRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO novels (id, title, genre, description, world_setting, style_guide, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                genre = excluded.genre,
                description = excluded.description,
                world_setting = excluded.world_setting,
                style_guide = excluded.style_guide,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(novel.id.to_string())
        .bind(&novel.title)
        .bind(&novel.genre)
        .bind(&novel.description)
        .bind(&novel.world_setting)
        .bind(&novel.style_guide)
        .bind(novel.created_at.to_rfc3339())
        .bind(novel.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_novel(&self, id: Uuid) -> Result<Option<NovelRecord>, RepositoryError> {
        let row: Option<NovelRow> = sqlx::query_as(
            "SELECT id, title, genre, description, world_setting, style_guide, created_at, updated_at FROM novels WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(NovelRecord::try_from).transpose()
    }

    async fn save_character(&self, character: &CharacterRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO characters (id, novel_id, name, description)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description
            "#,
        )
        .bind(character.id.to_string())
        .bind(character.novel_id.to_string())
        .bind(&character.name)
        .bind(&character.description)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_characters(&self, novel_id: Uuid) -> Result<Vec<CharacterRecord>, RepositoryError> {
        let rows: Vec<CharacterRow> = sqlx::query_as(
            "SELECT id, novel_id, name, description FROM characters WHERE novel_id = ? ORDER BY rowid",
        )
        .bind(novel_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(CharacterRecord::try_from).collect()
    }

    async fn save_plot_point(&self, plot_point: &PlotPointRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO plot_points (id, novel_id, title, description)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description
            "#,
        )
        .bind(plot_point.id.to_string())
        .bind(plot_point.novel_id.to_string())
        .bind(&plot_point.title)
        .bind(&plot_point.description)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_plot_points(&self, novel_id: Uuid) -> Result<Vec<PlotPointRecord>, RepositoryError> {
        let rows: Vec<PlotPointRow> = sqlx::query_as(
            "SELECT id, novel_id, title, description FROM plot_points WHERE novel_id = ? ORDER BY rowid",
        )
        .bind(novel_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(PlotPointRecord::try_from).collect()
    }

    async fn save_chapter(&self, chapter: &ChapterRecord) -> Result<(), RepositoryError> {
        // 同一章节号重复写入时覆盖
        sqlx::query(
            r#"
            INSERT INTO chapters (id, novel_id, chapter_number, title, content, summary, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(novel_id, chapter_number) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                summary = excluded.summary
            "#,
        )
        .bind(chapter.id.to_string())
        .bind(chapter.novel_id.to_string())
        .bind(chapter.chapter_number as i64)
        .bind(&chapter.title)
        .bind(&chapter.content)
        .bind(&chapter.summary)
        .bind(chapter.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_recent_chapters(
        &self,
        novel_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChapterRecord>, RepositoryError> {
        let rows: Vec<ChapterRow> = sqlx::query_as(
            r#"
            SELECT id, novel_id, chapter_number, title, content, summary, created_at
            FROM chapters
            WHERE novel_id = ?
            ORDER BY chapter_number DESC
            LIMIT ?
            "#,
        )
        .bind(novel_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(ChapterRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    async fn repo() -> SqliteNovelRepository {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteNovelRepository::new(pool)
    }

    fn novel() -> NovelRecord {
        NovelRecord {
            id: Uuid::new_v4(),
            title: "The Gate".to_string(),
            genre: "Fantasy".to_string(),
            description: String::new(),
            world_setting: String::new(),
            style_guide: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_novel_round_trip() {
        let repo = repo().await;
        let mut novel = novel();
        repo.save_novel(&novel).await.unwrap();

        novel.genre = "Dark fantasy".to_string();
        repo.save_novel(&novel).await.unwrap();

        let found = repo.find_novel(novel.id).await.unwrap().unwrap();
        assert_eq!(found.genre, "Dark fantasy");
        assert!(repo.find_novel(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_chapters_descending_with_limit() {
        let repo = repo().await;
        let novel = novel();
        repo.save_novel(&novel).await.unwrap();

        for n in [3u32, 1, 2] {
            repo.save_chapter(&ChapterRecord {
                id: Uuid::new_v4(),
                novel_id: novel.id,
                chapter_number: n,
                title: format!("Chapter {}", n),
                content: String::new(),
                summary: format!("s{}", n),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }

        let chapters = repo.find_recent_chapters(novel.id, 2).await.unwrap();
        let numbers: Vec<u32> = chapters.iter().map(|c| c.chapter_number).collect();
        assert_eq!(numbers, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_character_requires_existing_novel() {
        let repo = repo().await;
        let result = repo
            .save_character(&CharacterRecord {
                id: Uuid::new_v4(),
                novel_id: Uuid::new_v4(),
                name: "Mira".to_string(),
                description: String::new(),
            })
            .await;
        assert!(result.is_err());
    }
}
