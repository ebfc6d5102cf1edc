//! 文本处理：章节清洗与上下文构建

mod context;
mod sanitizer;

pub use context::{build_context, ContextChapter, DEFAULT_MAX_CONTEXT_CHARS};
pub use sanitizer::{count_words, sanitize};
