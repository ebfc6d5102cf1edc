//! Data Transfer Objects

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::generation::Phase;
use crate::application::ports::BookRecord;
use crate::application::{BookProgressView, GenerationStepResponse};
use crate::domain::{BookSettings, GenerationSpeed, Outline};

// ============================================================================
// Generation DTOs
// ============================================================================

/// 生成请求（两种传输方式共用）
///
/// 必填字段声明为 Option，缺失时返回 400 而不是反序列化失败
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBookRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub outline: Option<Outline>,
    #[serde(default)]
    pub config: Option<BookSettings>,
    /// 以下三项覆盖 config 中的同名字段
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub generation_speed: Option<GenerationSpeed>,
    #[serde(default)]
    pub use_parallel: Option<bool>,
    #[serde(default)]
    pub book_id: Option<Uuid>,
    /// 仅兼容旧客户端；续跑位置总是由持久化状态决定
    #[serde(default)]
    pub start_chapter: Option<u32>,
}

impl GenerateBookRequest {
    /// 合并顶层覆盖项后的配置
    pub fn merged_settings(&self, base: BookSettings) -> BookSettings {
        let mut settings = base;
        if let Some(model_id) = &self.model_id {
            settings.model_id = Some(model_id.clone());
        }
        if let Some(speed) = self.generation_speed {
            settings.generation_speed = speed;
        }
        if let Some(parallel) = self.use_parallel {
            settings.use_parallel = parallel;
        }
        settings
    }
}

/// 增量模式响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBookResponse {
    pub success: bool,
    pub phase: Phase,
    pub book_id: Uuid,
    pub chapters_completed: usize,
    pub total_chapters: usize,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_chapters: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book: Option<BookRecord>,
}

impl From<GenerationStepResponse> for GenerateBookResponse {
    fn from(step: GenerationStepResponse) -> Self {
        Self {
            success: true,
            phase: step.phase,
            book_id: step.book_id,
            chapters_completed: step.chapters_completed,
            total_chapters: step.total_chapters,
            progress: step.progress,
            message: step.message,
            failed_chapters: step.failed_chapters,
            book: step.book,
        }
    }
}

// ============================================================================
// Book status DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStatusParams {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSummaryResponse {
    pub number: u32,
    pub title: String,
    pub word_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStatusResponse {
    pub success: bool,
    pub book_id: Uuid,
    pub title: String,
    pub status: &'static str,
    pub phase: Phase,
    pub chapters_completed: usize,
    pub total_chapters: usize,
    pub progress: u8,
    pub message: String,
    pub chapters: Vec<ChapterSummaryResponse>,
    pub missing_chapters: Vec<u32>,
    pub cover_url: Option<String>,
    pub back_cover_url: Option<String>,
    pub word_count: u64,
}

impl From<BookProgressView> for BookStatusResponse {
    fn from(view: BookProgressView) -> Self {
        Self {
            success: true,
            book_id: view.book.id,
            title: view.book.outline.title.clone(),
            status: view.book.status.as_str(),
            phase: view.phase,
            chapters_completed: view.snapshot.chapters_completed,
            total_chapters: view.snapshot.total_chapters,
            progress: view.snapshot.percent,
            message: view.snapshot.message,
            chapters: view
                .chapters
                .into_iter()
                .map(|c| ChapterSummaryResponse {
                    number: c.number,
                    title: c.title,
                    word_count: c.word_count,
                })
                .collect(),
            missing_chapters: view.missing_chapters,
            cover_url: view.book.cover_url.clone(),
            back_cover_url: view.book.metadata.back_cover_url.clone(),
            word_count: view.book.metadata.word_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_overrides_config() {
        let request: GenerateBookRequest = serde_json::from_str(
            r#"{
                "userId": "u1",
                "outline": {"title": "T", "chapters": [{"number": 1, "title": "One"}]},
                "config": {"writingStyle": "terse", "useParallel": true},
                "generationSpeed": "quality",
                "useParallel": false,
                "startChapter": 3
            }"#,
        )
        .unwrap();

        let settings = request.merged_settings(request.config.clone().unwrap());
        assert_eq!(settings.writing_style, "terse");
        assert_eq!(settings.generation_speed, GenerationSpeed::Quality);
        assert!(!settings.use_parallel);
        assert_eq!(request.start_chapter, Some(3));
    }

    #[test]
    fn test_missing_fields_still_deserialize() {
        let request: GenerateBookRequest = serde_json::from_str("{}").unwrap();
        assert!(request.user_id.is_none());
        assert!(request.outline.is_none());
    }
}
