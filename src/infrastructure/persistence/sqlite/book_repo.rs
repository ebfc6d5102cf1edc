//! SQLite Book Repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::DbPool;
use crate::application::ports::{
    BookPatch, BookRecord, BookRepositoryPort, BookStatus, ChapterRecord, RepositoryError,
};

/// SQLite Book Repository
pub struct SqliteBookRepository {
    pool: DbPool,
}

impl SqliteBookRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::DatabaseError(e.to_string())
}

fn ser_err(e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::SerializationError(e.to_string())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(ser_err)
}

#[derive(FromRow)]
struct BookRow {
    id: String,
    user_id: String,
    outline: String,
    settings: String,
    status: String,
    cover_url: Option<String>,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<BookRow> for BookRecord {
    type Error = RepositoryError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(BookRecord {
            id: Uuid::parse_str(&row.id).map_err(ser_err)?,
            user_id: row.user_id,
            outline: serde_json::from_str(&row.outline).map_err(ser_err)?,
            settings: serde_json::from_str(&row.settings).map_err(ser_err)?,
            status: BookStatus::from_str(&row.status).unwrap_or_default(),
            cover_url: row.cover_url,
            metadata: serde_json::from_str(&row.metadata).map_err(ser_err)?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct ChapterRow {
    id: String,
    book_id: String,
    number: i64,
    title: String,
    content: String,
    word_count: i64,
    edited: bool,
    created_at: String,
}

impl TryFrom<ChapterRow> for ChapterRecord {
    type Error = RepositoryError;

    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        Ok(ChapterRecord {
            id: Uuid::parse_str(&row.id).map_err(ser_err)?,
            book_id: Uuid::parse_str(&row.book_id).map_err(ser_err)?,
            number: row.number as u32,
            title: row.title,
            content: row.content,
            word_count: row.word_count as u32,
            edited: row.edited,
            created_at: parse_time(&row.created_at)?,
        })
    }
}

const BOOK_COLUMNS: &str =
    "id, user_id, outline, settings, status, cover_url, metadata, created_at, updated_at";

#[async_trait]
impl BookRepositoryPort for SqliteBookRepository {
    async fn create_book(&self, book: &BookRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO books (id, user_id, title, outline, settings, status, cover_url, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(book.id.to_string())
        .bind(&book.user_id)
        .bind(&book.outline.title)
        .bind(serde_json::to_string(&book.outline).map_err(ser_err)?)
        .bind(serde_json::to_string(&book.settings).map_err(ser_err)?)
        .bind(book.status.as_str())
        .bind(book.cover_url.as_deref())
        .bind(serde_json::to_string(&book.metadata).map_err(ser_err)?)
        .bind(book.created_at.to_rfc3339())
        .bind(book.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepositoryError> {
        let row: Option<BookRow> =
            sqlx::query_as(&format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        row.map(BookRecord::try_from).transpose()
    }

    async fn get_book_chapters(&self, book_id: Uuid) -> Result<Vec<ChapterRecord>, RepositoryError> {
        let rows: Vec<ChapterRow> = sqlx::query_as(
            "SELECT id, book_id, number, title, content, word_count, edited, created_at FROM chapters WHERE book_id = ? ORDER BY number",
        )
        .bind(book_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(ChapterRecord::try_from).collect()
    }

    async fn create_multiple_chapters(&self, records: &[ChapterRecord]) -> Result<(), RepositoryError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut query = String::from(
            "INSERT INTO chapters (id, book_id, number, title, content, word_count, edited, created_at) VALUES ",
        );
        let placeholders: Vec<&str> = records.iter().map(|_| "(?, ?, ?, ?, ?, ?, ?, ?)").collect();
        query.push_str(&placeholders.join(", "));
        // 已存在的章节编号保持不变
        query.push_str(" ON CONFLICT(book_id, number) DO NOTHING");

        let mut sql_query = sqlx::query(&query);
        for record in records {
            sql_query = sql_query
                .bind(record.id.to_string())
                .bind(record.book_id.to_string())
                .bind(i64::from(record.number))
                .bind(&record.title)
                .bind(&record.content)
                .bind(i64::from(record.word_count))
                .bind(record.edited)
                .bind(record.created_at.to_rfc3339());
        }

        let result = sql_query.execute(&self.pool).await.map_err(db_err)?;
        tracing::debug!(
            requested = records.len(),
            inserted = result.rows_affected(),
            "Chapters inserted"
        );
        Ok(())
    }

    async fn update_book(&self, id: Uuid, patch: &BookPatch) -> Result<BookRecord, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row: Option<BookRow> =
            sqlx::query_as(&format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS))
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let mut book = row
            .map(BookRecord::try_from)
            .transpose()?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        book.apply(patch);

        sqlx::query(
            r#"
            UPDATE books
            SET status = ?, cover_url = ?, metadata = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(book.status.as_str())
        .bind(book.cover_url.as_deref())
        .bind(serde_json::to_string(&book.metadata).map_err(ser_err)?)
        .bind(book.updated_at.to_rfc3339())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(book)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::BookMetadata;
    use crate::domain::{sample_outline, BookSettings};
    use crate::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};

    async fn repo() -> SqliteBookRepository {
        let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteBookRepository::new(pool)
    }

    #[tokio::test]
    async fn test_book_roundtrip_through_json_columns() {
        let repo = repo().await;
        let mut settings = BookSettings::default();
        settings.use_parallel = false;
        let book = BookRecord::new("user-1", sample_outline(3), settings.clone());
        repo.create_book(&book).await.unwrap();

        let loaded = repo.get_book(book.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "user-1");
        assert_eq!(loaded.outline, book.outline);
        assert_eq!(loaded.settings, settings);
        assert_eq!(loaded.status, BookStatus::Generating);
        assert!(repo.get_book(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_chapter_insert_ignores_existing_numbers() {
        let repo = repo().await;
        let book = BookRecord::new("user-1", sample_outline(3), BookSettings::default());
        repo.create_book(&book).await.unwrap();

        repo.create_multiple_chapters(&[
            ChapterRecord::new(book.id, 3, "Three".to_string(), "third".to_string(), 1),
            ChapterRecord::new(book.id, 1, "One".to_string(), "first".to_string(), 1),
        ])
        .await
        .unwrap();
        repo.create_multiple_chapters(&[
            ChapterRecord::new(book.id, 1, "One".to_string(), "replaced".to_string(), 1),
            ChapterRecord::new(book.id, 2, "Two".to_string(), "second".to_string(), 1),
        ])
        .await
        .unwrap();

        let chapters = repo.get_book_chapters(book.id).await.unwrap();
        assert_eq!(chapters.iter().map(|c| c.number).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(chapters[0].content, "first");
    }

    #[tokio::test]
    async fn test_update_book_persists_patch() {
        let repo = repo().await;
        let book = BookRecord::new("user-1", sample_outline(1), BookSettings::default());
        repo.create_book(&book).await.unwrap();

        let metadata = BookMetadata {
            word_count: 1200,
            chapter_count: 1,
            cover_attempts: 2,
            ..Default::default()
        };
        repo.update_book(
            book.id,
            &BookPatch {
                status: Some(BookStatus::Completed),
                cover_url: Some("https://img.test/front.png".to_string()),
                metadata: Some(metadata.clone()),
            },
        )
        .await
        .unwrap();

        let loaded = repo.get_book(book.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, BookStatus::Completed);
        assert_eq!(loaded.cover_url.as_deref(), Some("https://img.test/front.png"));
        assert_eq!(loaded.metadata, metadata);

        let missing = repo.update_book(Uuid::new_v4(), &BookPatch::default()).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
    }
}
