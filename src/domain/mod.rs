//! Domain Layer - 领域层
//!
//! 纯逻辑，无副作用:
//! - Book Context: 大纲与生成配置
//! - 文本处理: 章节清洗、上下文构建
//! - 失败分类

pub mod book;
pub mod failure;
pub mod text;

pub use book::{BibliographySettings, BookError, BookSettings, ChapterStub, CitationStyle, GenerationSpeed, Outline};
pub use failure::{classify, classify_error, ClassifiedFailure, FailureKind};
pub use text::{build_context, count_words, sanitize, ContextChapter, DEFAULT_MAX_CONTEXT_CHARS};

#[cfg(test)]
pub(crate) use book::sample_outline;
