//! In-Memory Book Repository Implementation

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::application::ports::{BookPatch, BookRecord, BookRepositoryPort, ChapterRecord, RepositoryError};

/// 内存书籍仓储
pub struct InMemoryBookRepository {
    /// book_id -> BookRecord
    books: DashMap<Uuid, BookRecord>,
    /// book_id -> (number -> ChapterRecord)
    chapters: DashMap<Uuid, BTreeMap<u32, ChapterRecord>>,
}

impl InMemoryBookRepository {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            chapters: DashMap::new(),
        }
    }
}

impl Default for InMemoryBookRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookRepositoryPort for InMemoryBookRepository {
    async fn create_book(&self, book: &BookRecord) -> Result<(), RepositoryError> {
        if self.books.contains_key(&book.id) {
            return Err(RepositoryError::DatabaseError(format!("book {} already exists", book.id)));
        }
        self.books.insert(book.id, book.clone());
        tracing::debug!(book_id = %book.id, "Book stored");
        Ok(())
    }

    async fn get_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepositoryError> {
        Ok(self.books.get(&id).map(|b| b.clone()))
    }

    async fn get_book_chapters(&self, book_id: Uuid) -> Result<Vec<ChapterRecord>, RepositoryError> {
        Ok(self
            .chapters
            .get(&book_id)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn create_multiple_chapters(&self, records: &[ChapterRecord]) -> Result<(), RepositoryError> {
        let mut inserted = 0;
        for record in records {
            let mut entry = self.chapters.entry(record.book_id).or_default();
            if !entry.contains_key(&record.number) {
                entry.insert(record.number, record.clone());
                inserted += 1;
            }
        }

        tracing::debug!(requested = records.len(), inserted = inserted, "Chapters stored");
        Ok(())
    }

    async fn update_book(&self, id: Uuid, patch: &BookPatch) -> Result<BookRecord, RepositoryError> {
        let mut book = self
            .books
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        book.apply(patch);
        Ok(book.clone())
    }
}
