//! Bibliography Port - 参考文献生成抽象

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CitationStyle, Outline};

use super::text_generator::GenerationError;

/// 单条参考文献
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// 已按引用格式排版的条目
    pub citation: String,
}

/// Bibliography Port
#[async_trait]
pub trait BibliographyPort: Send + Sync {
    async fn generate_references(
        &self,
        outline: &Outline,
        chapter_titles: &[String],
        style: CitationStyle,
    ) -> Result<Vec<Reference>, GenerationError>;
}
