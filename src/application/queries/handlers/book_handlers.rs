//! Book Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::generation::{
    completed_count, missing_chapters, GenerationOrchestrator, Phase, ProgressSnapshot,
};
use crate::application::ports::{BookRecord, ChapterRecord};
use crate::application::queries::GetBookProgress;

// ============================================================================
// Response DTOs
// ============================================================================

/// 章节摘要（不含正文）
#[derive(Debug, Clone)]
pub struct ChapterSummary {
    pub number: u32,
    pub title: String,
    pub word_count: u32,
}

impl From<&ChapterRecord> for ChapterSummary {
    fn from(record: &ChapterRecord) -> Self {
        Self {
            number: record.number,
            title: record.title.clone(),
            word_count: record.word_count,
        }
    }
}

/// 书籍进度视图
#[derive(Debug, Clone)]
pub struct BookProgressView {
    pub book: BookRecord,
    pub phase: Phase,
    pub snapshot: ProgressSnapshot,
    pub chapters: Vec<ChapterSummary>,
    pub missing_chapters: Vec<u32>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GetBookProgress Handler
///
/// 阶段推导与编排器共用同一封面尝试上限
pub struct GetBookProgressHandler {
    orchestrator: Arc<GenerationOrchestrator>,
}

impl GetBookProgressHandler {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn handle(&self, query: GetBookProgress) -> Result<BookProgressView, ApplicationError> {
        let repo = self.orchestrator.repository();
        let book = repo
            .get_book(query.book_id)
            .await?
            .filter(|b| b.user_id == query.user_id)
            .ok_or_else(|| ApplicationError::not_found("Book", query.book_id))?;
        let chapters = repo.get_book_chapters(book.id).await?;

        let phase = self.orchestrator.phase_of(Some(&book), &chapters);
        let snapshot = ProgressSnapshot::new(phase, completed_count(&book, &chapters), book.total_chapters());

        Ok(BookProgressView {
            phase,
            snapshot,
            chapters: chapters.iter().map(ChapterSummary::from).collect(),
            missing_chapters: missing_chapters(&book, &chapters),
            book,
        })
    }
}
