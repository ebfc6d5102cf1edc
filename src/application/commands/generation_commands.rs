//! Generation Commands - 书籍生成命令

use uuid::Uuid;

use crate::application::generation::Phase;
use crate::application::ports::BookRecord;
use crate::domain::{BookSettings, Outline};

/// 生成书籍命令（两种传输方式共用）
#[derive(Debug, Clone)]
pub struct GenerateBookCommand {
    pub user_id: String,
    pub outline: Outline,
    pub settings: BookSettings,
    /// 续跑已有书籍
    pub book_id: Option<Uuid>,
}

/// 增量推进一步后的响应
#[derive(Debug, Clone)]
pub struct GenerationStepResponse {
    /// 本次执行的阶段
    pub phase: Phase,
    pub book_id: Uuid,
    pub chapters_completed: usize,
    pub total_chapters: usize,
    pub progress: u8,
    pub message: String,
    /// 本次失败的章节
    pub failed_chapters: Vec<u32>,
    /// 完成时附带书籍
    pub book: Option<BookRecord>,
}
