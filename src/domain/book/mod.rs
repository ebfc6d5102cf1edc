//! Book Context - 书籍限界上下文
//!
//! 职责:
//! - 大纲（Outline）值对象及校验
//! - 生成配置（BookSettings）

mod errors;
mod outline;
mod settings;

pub use errors::BookError;
pub use outline::{ChapterStub, Outline};
pub use settings::{BibliographySettings, BookSettings, CitationStyle, GenerationSpeed};

#[cfg(test)]
pub(crate) use outline::sample_outline;
