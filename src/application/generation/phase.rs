//! 阶段推导
//!
//! 阶段不单独存储，而是每次从持久化的 (BookRecord, ChapterRecord 集合) 推导。
//! 这是流水线可以在进程重启后继续的原因：不需要额外的任务记录。

use std::collections::BTreeSet;

use serde::Serialize;

use crate::application::ports::{BookRecord, ChapterRecord};

/// 默认封面尝试次数上限
pub const DEFAULT_MAX_COVER_ATTEMPTS: u32 = 3;

/// 生成阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// 尚无 BookRecord
    Creating,
    /// 仍有章节未生成
    Generating,
    /// 章节齐全，缺少封面
    Cover,
    /// 可以（或已经）完成
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Creating => "creating",
            Phase::Generating => "generating",
            Phase::Cover => "cover",
            Phase::Completed => "completed",
        }
    }
}

/// 大纲范围 1..=N 内已持久化的章节编号
fn persisted_numbers(book: &BookRecord, chapters: &[ChapterRecord]) -> BTreeSet<u32> {
    let total = book.total_chapters() as u32;
    chapters
        .iter()
        .filter(|c| c.book_id == book.id && (1..=total).contains(&c.number))
        .map(|c| c.number)
        .collect()
}

/// 已完成章节数
pub fn completed_count(book: &BookRecord, chapters: &[ChapterRecord]) -> usize {
    persisted_numbers(book, chapters).len()
}

/// 尚未持久化的章节编号（升序）
pub fn missing_chapters(book: &BookRecord, chapters: &[ChapterRecord]) -> Vec<u32> {
    let present = persisted_numbers(book, chapters);
    (1..=book.total_chapters() as u32)
        .filter(|n| !present.contains(n))
        .collect()
}

/// 推导阶段（默认封面尝试上限）
pub fn derive_phase(book: Option<&BookRecord>, chapters: &[ChapterRecord]) -> Phase {
    derive_phase_with(book, chapters, DEFAULT_MAX_COVER_ATTEMPTS)
}

/// 推导阶段
///
/// 规则（按顺序）:
/// 1. 无 BookRecord → Creating
/// 2. 已完成章节数 < 总章节数 → Generating
/// 3. 缺少 cover_url 且封面尝试次数未用尽 → Cover
/// 4. 否则 → Completed
pub fn derive_phase_with(
    book: Option<&BookRecord>,
    chapters: &[ChapterRecord],
    max_cover_attempts: u32,
) -> Phase {
    let Some(book) = book else {
        return Phase::Creating;
    };

    if completed_count(book, chapters) < book.total_chapters() {
        return Phase::Generating;
    }

    if book.cover_url.is_none() && book.metadata.cover_attempts < max_cover_attempts {
        return Phase::Cover;
    }

    Phase::Completed
}
