//! Book Context - 生成配置
//!
//! 每次运行提供一次，编排器不会修改

use serde::{Deserialize, Serialize};

/// 引用格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    #[default]
    Apa,
    Mla,
    Chicago,
    Harvard,
}

impl CitationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationStyle::Apa => "apa",
            CitationStyle::Mla => "mla",
            CitationStyle::Chicago => "chicago",
            CitationStyle::Harvard => "harvard",
        }
    }
}

/// 参考文献配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BibliographySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub citation_style: CitationStyle,
}

/// 生成速度预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationSpeed {
    Fast,
    #[default]
    Balanced,
    Quality,
}

impl GenerationSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationSpeed::Fast => "fast",
            GenerationSpeed::Balanced => "balanced",
            GenerationSpeed::Quality => "quality",
        }
    }
}

fn default_writing_style() -> String {
    "engaging".to_string()
}

fn default_target_audience() -> String {
    "general readers".to_string()
}

fn default_use_parallel() -> bool {
    true
}

/// 书籍生成配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSettings {
    /// 写作风格
    #[serde(default = "default_writing_style")]
    pub writing_style: String,

    /// 目标读者
    #[serde(default = "default_target_audience")]
    pub target_audience: String,

    #[serde(default)]
    pub bibliography: BibliographySettings,

    /// 显式模型；为空时按速度预设选择
    #[serde(default)]
    pub model_id: Option<String>,

    #[serde(default)]
    pub generation_speed: GenerationSpeed,

    /// 批内是否并行生成
    #[serde(default = "default_use_parallel")]
    pub use_parallel: bool,
}

impl Default for BookSettings {
    fn default() -> Self {
        Self {
            writing_style: default_writing_style(),
            target_audience: default_target_audience(),
            bibliography: BibliographySettings::default(),
            model_id: None,
            generation_speed: GenerationSpeed::default(),
            use_parallel: default_use_parallel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let settings: BookSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, BookSettings::default());
        assert!(settings.use_parallel);
        assert_eq!(settings.generation_speed, GenerationSpeed::Balanced);
        assert!(!settings.bibliography.enabled);
    }

    #[test]
    fn test_nested_bibliography() {
        let json = r#"{"bibliography": {"enabled": true, "citationStyle": "chicago"}, "useParallel": false}"#;
        let settings: BookSettings = serde_json::from_str(json).unwrap();
        assert!(settings.bibliography.enabled);
        assert_eq!(settings.bibliography.citation_style, CitationStyle::Chicago);
        assert!(!settings.use_parallel);
    }
}
