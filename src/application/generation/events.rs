//! 流式生成事件
//!
//! 每个事件对应一次有意义的状态变化；SSE 帧为 `event: <name>` + `data: <json>`

use serde::Serialize;
use uuid::Uuid;

use crate::application::ports::BookRecord;
use crate::domain::{ClassifiedFailure, FailureKind};

/// 封面面别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverSide {
    Front,
    Back,
}

/// 面向客户端的错误体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventError {
    pub kind: FailureKind,
    pub error: String,
    pub details: String,
}

impl From<&ClassifiedFailure> for EventError {
    fn from(failure: &ClassifiedFailure) -> Self {
        Self {
            kind: failure.kind,
            error: failure.user_message.clone(),
            details: failure.user_details.clone(),
        }
    }
}

/// 流式生成事件
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GenerationEvent {
    #[serde(rename_all = "camelCase")]
    Start {
        book_id: Option<Uuid>,
        chapters_completed: usize,
        total_chapters: usize,
        progress: u8,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    BookCreated {
        book_id: Uuid,
        title: String,
        total_chapters: usize,
        progress: u8,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    BatchStart {
        book_id: Uuid,
        batch_number: usize,
        total_batches: usize,
        chapters: Vec<u32>,
        progress: u8,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    ChapterProgress {
        book_id: Uuid,
        chapter_number: u32,
        title: String,
        word_count: u32,
        chapters_completed: usize,
        total_chapters: usize,
        progress: u8,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    ChapterError {
        book_id: Uuid,
        chapter_number: u32,
        #[serde(flatten)]
        error: EventError,
    },
    #[serde(rename_all = "camelCase")]
    BatchError {
        book_id: Uuid,
        batch_number: usize,
        chapters: Vec<u32>,
        fallback: String,
        #[serde(flatten)]
        error: EventError,
    },
    #[serde(rename_all = "camelCase")]
    BatchComplete {
        book_id: Uuid,
        batch_number: usize,
        total_batches: usize,
        chapters_completed: usize,
        total_chapters: usize,
        failed_chapters: Vec<u32>,
        progress: u8,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    CoversStart {
        book_id: Uuid,
        progress: u8,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    CoverComplete {
        book_id: Uuid,
        side: CoverSide,
        url: String,
        progress: u8,
    },
    #[serde(rename_all = "camelCase")]
    CoverError {
        book_id: Uuid,
        side: CoverSide,
        #[serde(flatten)]
        error: EventError,
    },
    #[serde(rename_all = "camelCase")]
    Complete {
        book_id: Uuid,
        chapters_completed: usize,
        total_chapters: usize,
        progress: u8,
        message: String,
        book: Box<BookRecord>,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        book_id: Option<Uuid>,
        progress_preserved: bool,
        missing_chapters: Vec<u32>,
        #[serde(flatten)]
        error: EventError,
    },
}

impl GenerationEvent {
    /// SSE 事件名
    pub fn name(&self) -> &'static str {
        match self {
            GenerationEvent::Start { .. } => "start",
            GenerationEvent::BookCreated { .. } => "book_created",
            GenerationEvent::BatchStart { .. } => "batch_start",
            GenerationEvent::ChapterProgress { .. } => "chapter_progress",
            GenerationEvent::ChapterError { .. } => "chapter_error",
            GenerationEvent::BatchError { .. } => "batch_error",
            GenerationEvent::BatchComplete { .. } => "batch_complete",
            GenerationEvent::CoversStart { .. } => "covers_start",
            GenerationEvent::CoverComplete { .. } => "cover_complete",
            GenerationEvent::CoverError { .. } => "cover_error",
            GenerationEvent::Complete { .. } => "complete",
            GenerationEvent::Error { .. } => "error",
        }
    }

    /// 是否为终止事件
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationEvent::Complete { .. } | GenerationEvent::Error { .. })
    }

    /// 事件携带的进度（如有）
    pub fn progress(&self) -> Option<u8> {
        match self {
            GenerationEvent::Start { progress, .. }
            | GenerationEvent::BookCreated { progress, .. }
            | GenerationEvent::BatchStart { progress, .. }
            | GenerationEvent::ChapterProgress { progress, .. }
            | GenerationEvent::BatchComplete { progress, .. }
            | GenerationEvent::CoversStart { progress, .. }
            | GenerationEvent::CoverComplete { progress, .. }
            | GenerationEvent::Complete { progress, .. } => Some(*progress),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classify;

    #[test]
    fn test_event_names_and_payload() {
        let id = Uuid::new_v4();
        let event = GenerationEvent::BatchStart {
            book_id: id,
            batch_number: 2,
            total_batches: 3,
            chapters: vec![5, 6, 7, 8],
            progress: 35,
            message: "Starting batch 2 of 3".to_string(),
        };
        assert_eq!(event.name(), "batch_start");
        assert!(!event.is_terminal());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["bookId"], id.to_string());
        assert_eq!(json["batchNumber"], 2);
        assert_eq!(json["chapters"], serde_json::json!([5, 6, 7, 8]));
    }

    #[test]
    fn test_error_event_flattens_classification() {
        let failure = classify("HTTP 429 Too Many Requests");
        let event = GenerationEvent::Error {
            book_id: None,
            progress_preserved: true,
            missing_chapters: vec![7],
            error: EventError::from(&failure),
        };
        assert!(event.is_terminal());
        assert_eq!(event.progress(), None);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "rate-limit");
        assert_eq!(json["progressPreserved"], true);
        assert_eq!(json["missingChapters"], serde_json::json!([7]));
        assert!(json["details"].as_str().unwrap().contains("progress has been saved"));
    }
}
