//! 章节文本清洗
//!
//! 去除生成产物中的格式残留并统计字数，纯函数、确定性

use once_cell::sync::Lazy;
use regex::Regex;

/// 代码围栏行（```markdown 等）
static FENCE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[^\n]*$").unwrap());

/// 分隔线（--- / *** / ___）
static RULE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$").unwrap());

/// Markdown 标题前缀
static HEADING_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").unwrap());

/// 粗体 / 斜体强调标记
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*|__").unwrap());

/// 三个及以上连续换行
static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// 清洗原始生成文本
pub fn sanitize(raw: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "\n");
    let text = FENCE_LINE.replace_all(&text, "");
    let text = RULE_LINE.replace_all(&text, "");
    let text = HEADING_MARKER.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "");

    let trimmed_lines: Vec<&str> = text.lines().map(|line| line.trim_end()).collect();
    let joined = trimmed_lines.join("\n");

    EXCESS_BLANK_LINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// 统计字数（仅计入含字母或数字的词）
pub fn count_words(text: &str) -> u32 {
    text.split_whitespace()
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .count() as u32
}
