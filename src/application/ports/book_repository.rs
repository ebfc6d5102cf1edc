//! Book Repository Port - 出站端口
//!
//! 书籍与章节持久化的抽象接口
//! 具体实现在 infrastructure 层（SQLite / 内存）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{BookSettings, CitationStyle, Outline};

use super::bibliography::Reference;

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 书籍状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    /// 生成中
    #[default]
    Generating,
    /// 已完成（仅在 finalize 时设置）
    Completed,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Generating => "generating",
            BookStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "generating" => Some(BookStatus::Generating),
            "completed" => Some(BookStatus::Completed),
            _ => None,
        }
    }
}

/// 参考文献信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BibliographySummary {
    pub citation_style: CitationStyle,
    pub references: Vec<Reference>,
}

/// 聚合元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    /// 所有章节字数之和
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub chapter_count: u32,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub back_cover_url: Option<String>,
    /// 封面生成失败次数
    #[serde(default)]
    pub cover_attempts: u32,
    #[serde(default)]
    pub bibliography: Option<BibliographySummary>,
}

/// 书籍实体（用于持久化）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    pub id: Uuid,
    pub user_id: String,
    pub outline: Outline,
    pub settings: BookSettings,
    pub status: BookStatus,
    pub cover_url: Option<String>,
    pub metadata: BookMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookRecord {
    pub fn new(user_id: impl Into<String>, outline: Outline, settings: BookSettings) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            outline,
            settings,
            status: BookStatus::Generating,
            cover_url: None,
            metadata: BookMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 大纲章节总数
    pub fn total_chapters(&self) -> usize {
        self.outline.total_chapters()
    }

    /// 应用补丁（仓储实现共用）
    pub fn apply(&mut self, patch: &BookPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(cover_url) = &patch.cover_url {
            self.cover_url = Some(cover_url.clone());
        }
        if let Some(metadata) = &patch.metadata {
            self.metadata = metadata.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// 章节实体，每个 (book_id, number) 只写入一次
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub id: Uuid,
    pub book_id: Uuid,
    pub number: u32,
    pub title: String,
    pub content: String,
    pub word_count: u32,
    pub edited: bool,
    pub created_at: DateTime<Utc>,
}

impl ChapterRecord {
    pub fn new(book_id: Uuid, number: u32, title: String, content: String, word_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            number,
            title,
            content,
            word_count,
            edited: false,
            created_at: Utc::now(),
        }
    }
}

/// 书籍部分更新
#[derive(Debug, Clone, Default)]
pub struct BookPatch {
    pub status: Option<BookStatus>,
    pub cover_url: Option<String>,
    pub metadata: Option<BookMetadata>,
}

/// Book Repository Port
#[async_trait]
pub trait BookRepositoryPort: Send + Sync {
    /// 创建书籍
    async fn create_book(&self, book: &BookRecord) -> Result<(), RepositoryError>;

    /// 根据 ID 查找书籍
    async fn get_book(&self, id: Uuid) -> Result<Option<BookRecord>, RepositoryError>;

    /// 获取书籍的所有章节（按编号升序）
    async fn get_book_chapters(&self, book_id: Uuid) -> Result<Vec<ChapterRecord>, RepositoryError>;

    /// 批量写入章节
    ///
    /// 只追加：已存在的章节编号保持不变
    async fn create_multiple_chapters(&self, records: &[ChapterRecord]) -> Result<(), RepositoryError>;

    /// 更新书籍，返回更新后的记录
    async fn update_book(&self, id: Uuid, patch: &BookPatch) -> Result<BookRecord, RepositoryError>;
}
