//! 上下文构建
//!
//! 把已完成章节拼成下一次生成调用的前文。
//!
//! 约定:
//! - 严格按章节编号升序输出
//! - 每个章节的标题行始终保留，章节越多上下文覆盖越多
//! - 超出长度上限时，从最旧的章节开始截断为摘录，最新章节优先保留全文

/// 默认上下文长度上限（字符）
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 24_000;

/// 截断后保留的摘录长度（字符）
const EXCERPT_CHARS: usize = 600;

/// 参与上下文构建的章节
#[derive(Debug, Clone, Copy)]
pub struct ContextChapter<'a> {
    pub number: u32,
    pub title: &'a str,
    pub content: &'a str,
}

/// 单章在上下文中的呈现方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rendering {
    Full,
    Excerpt,
    HeadingOnly,
}

fn heading(chapter: &ContextChapter<'_>) -> String {
    format!("Chapter {}: {}\n", chapter.number, chapter.title)
}

fn excerpt(content: &str) -> String {
    let mut out: String = content.chars().take(EXCERPT_CHARS).collect();
    if content.chars().count() > EXCERPT_CHARS {
        out.push('…');
    }
    out
}

/// 构建上下文文本
pub fn build_context(chapters: &[ContextChapter<'_>], max_chars: usize) -> String {
    if chapters.is_empty() {
        return String::new();
    }

    let mut ordered: Vec<&ContextChapter<'_>> = chapters.iter().collect();
    ordered.sort_by_key(|c| c.number);

    let headings: Vec<String> = ordered.iter().map(|c| heading(c)).collect();
    let heading_total: usize = headings.iter().map(|h| h.chars().count() + 1).sum();
    let content_total: usize = ordered.iter().map(|c| c.content.chars().count()).sum();

    let mut renderings = vec![Rendering::Full; ordered.len()];

    if heading_total + content_total > max_chars {
        let mut remaining = max_chars.saturating_sub(heading_total);
        for (idx, chapter) in ordered.iter().enumerate().rev() {
            let len = chapter.content.chars().count();
            renderings[idx] = if len <= remaining {
                remaining -= len;
                Rendering::Full
            } else if remaining >= EXCERPT_CHARS + 1 {
                remaining -= EXCERPT_CHARS + 1;
                Rendering::Excerpt
            } else {
                Rendering::HeadingOnly
            };
        }
    }

    let mut out = String::new();
    for ((chapter, head), rendering) in ordered.iter().zip(headings).zip(renderings) {
        out.push_str(&head);
        match rendering {
            Rendering::Full => out.push_str(chapter.content),
            Rendering::Excerpt => out.push_str(&excerpt(chapter.content)),
            Rendering::HeadingOnly => {}
        }
        out.push_str("\n\n");
    }

    out.trim_end().to_string()
}
