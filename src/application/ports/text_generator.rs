//! Text Generator Port - 文本生成提供方抽象
//!
//! 定义章节生成的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use futures_util::future::join_all;
use thiserror::Error;

use crate::domain::{build_context, BibliographySettings, ContextChapter, Outline, DEFAULT_MAX_CONTEXT_CHARS};

/// 提供方错误（图像、参考文献端口共用）
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// 单章生成请求
#[derive(Debug, Clone, Copy)]
pub struct ChapterRequest<'a> {
    pub outline: &'a Outline,
    pub chapter_number: u32,
    /// 前文上下文
    pub preceding_context: &'a str,
    pub model_id: &'a str,
    pub bibliography: Option<&'a BibliographySettings>,
}

/// 生成的原始章节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedText {
    pub title: String,
    pub content: String,
}

/// 批量生成中的单章结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchChapter {
    pub chapter_number: u32,
    pub title: String,
    pub content: String,
}

/// 批内单章完成通知，在该章返回后立即同步调用
pub trait ChapterSink: Send + Sync {
    fn chapter_done(&self, chapter: &BatchChapter);
}

/// Text Generator Port
#[async_trait]
pub trait TextGeneratorPort: Send + Sync {
    /// 检查提供方是否可用（凭据缺失时返回 NotConfigured）
    fn ensure_ready(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    /// 生成单章
    async fn generate_chapter(&self, request: ChapterRequest<'_>) -> Result<GeneratedText, GenerationError>;

    /// 批量生成
    ///
    /// 默认实现：所有章节共享同一份上下文并发生成，等待全部结束；
    /// 任一失败则整批失败。`on_chapter_done` 在每章成功时立即调用，不等兄弟章节
    async fn generate_chapter_batch(
        &self,
        outline: &Outline,
        chapter_numbers: &[u32],
        preceding_context: &str,
        model_id: &str,
        bibliography: Option<&BibliographySettings>,
        on_chapter_done: Option<&dyn ChapterSink>,
    ) -> Result<Vec<BatchChapter>, GenerationError> {
        let calls = chapter_numbers.iter().map(|&chapter_number| async move {
            let request = ChapterRequest {
                outline,
                chapter_number,
                preceding_context,
                model_id,
                bibliography,
            };
            let chapter = self.generate_chapter(request).await.map(|text| BatchChapter {
                chapter_number,
                title: text.title,
                content: text.content,
            })?;
            if let Some(sink) = on_chapter_done {
                sink.chapter_done(&chapter);
            }
            Ok::<_, GenerationError>(chapter)
        });

        join_all(calls).await.into_iter().collect()
    }

    /// 构建章节上下文
    fn build_chapter_context(&self, chapters: &[ContextChapter<'_>]) -> String {
        build_context(chapters, DEFAULT_MAX_CONTEXT_CHARS)
    }
}
