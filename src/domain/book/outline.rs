//! Book Context - Outline 值对象
//!
//! 生成开始前提供的逐章计划，运行期间不可变

use serde::{Deserialize, Serialize};

use super::BookError;

/// 单章计划
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterStub {
    /// 章节编号（1..N）
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    /// 目标字数
    #[serde(default)]
    pub target_word_count: Option<u32>,
}

/// 大纲
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub description: String,
    pub chapters: Vec<ChapterStub>,
}

impl Outline {
    /// 章节总数
    pub fn total_chapters(&self) -> usize {
        self.chapters.len()
    }

    /// 获取指定编号的章节计划
    pub fn chapter(&self, number: u32) -> Option<&ChapterStub> {
        self.chapters.iter().find(|c| c.number == number)
    }

    /// 校验大纲
    ///
    /// 不变量:
    /// - 标题非空
    /// - 至少一章
    /// - 章节编号按顺序恰好为 1..N
    pub fn validate(&self) -> Result<(), BookError> {
        if self.title.trim().is_empty() {
            return Err(BookError::InvalidOutline("title is required".to_string()));
        }
        if self.chapters.is_empty() {
            return Err(BookError::InvalidOutline(
                "outline must contain at least one chapter".to_string(),
            ));
        }
        for (position, stub) in self.chapters.iter().enumerate() {
            let expected = position as u32 + 1;
            if stub.number != expected {
                return Err(BookError::InvalidOutline(format!(
                    "chapter numbers must be contiguous from 1, expected {} but found {}",
                    expected, stub.number
                )));
            }
            if stub.title.trim().is_empty() {
                return Err(BookError::InvalidOutline(format!(
                    "chapter {} has no title",
                    stub.number
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_outline(chapters: u32) -> Outline {
    Outline {
        title: "The Lighthouse Keeper".to_string(),
        author: "A. Writer".to_string(),
        genre: "literary fiction".to_string(),
        description: "A keeper and the sea".to_string(),
        chapters: (1..=chapters)
            .map(|n| ChapterStub {
                number: n,
                title: format!("Chapter Title {}", n),
                summary: format!("Summary of chapter {}", n),
                target_word_count: Some(2500),
            })
            .collect(),
    }
}
