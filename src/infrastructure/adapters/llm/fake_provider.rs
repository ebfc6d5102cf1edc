//! Fake Provider - 离线确定性提供方
//!
//! 不调用任何外部服务，用于本地运行（provider.kind = fake）

use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::{
    BibliographyPort, BrandingOptions, ChapterRequest, CoverImagePort, CoverRequest, GeneratedText,
    GenerationError, Reference, TextGeneratorPort,
};
use crate::domain::{CitationStyle, Outline};

const PARAGRAPHS: &[&str] = &[
    "The morning arrived without ceremony, grey light pooling in the corners of the room.",
    "Nobody spoke of what had happened the night before, though everyone was thinking of it.",
    "A letter waited on the table, its seal unbroken, its handwriting unmistakable.",
    "Outside, the wind carried the smell of salt and something older beneath it.",
    "By the time the bells rang noon, the decision had already been made for them.",
];

/// Fake Provider 配置
#[derive(Debug, Clone)]
pub struct FakeProviderConfig {
    /// 模拟延迟
    pub latency: Duration,
    /// 每章段落数
    pub paragraphs_per_chapter: usize,
}

impl Default for FakeProviderConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(200),
            paragraphs_per_chapter: 6,
        }
    }
}

/// Fake Provider
pub struct FakeProvider {
    config: FakeProviderConfig,
}

impl FakeProvider {
    pub fn new(config: FakeProviderConfig) -> Self {
        tracing::info!(latency_ms = config.latency.as_millis() as u64, "FakeProvider initialized");
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeProviderConfig::default())
    }

    async fn simulate_latency(&self) {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }
    }
}

fn slug(title: &str) -> String {
    let slug: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    slug.split('-').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("-")
}

#[async_trait]
impl TextGeneratorPort for FakeProvider {
    async fn generate_chapter(&self, request: ChapterRequest<'_>) -> Result<GeneratedText, GenerationError> {
        tracing::debug!(
            chapter = request.chapter_number,
            context_len = request.preceding_context.len(),
            "FakeProvider: generating chapter"
        );
        self.simulate_latency().await;

        let stub = request.outline.chapter(request.chapter_number);
        let title = stub.map(|s| s.title.clone()).unwrap_or_default();
        let mut paragraphs = Vec::with_capacity(self.config.paragraphs_per_chapter + 1);
        if let Some(summary) = stub.map(|s| s.summary.trim()).filter(|s| !s.is_empty()) {
            paragraphs.push(summary.to_string());
        }
        let offset = request.chapter_number as usize;
        for i in 0..self.config.paragraphs_per_chapter {
            paragraphs.push(PARAGRAPHS[(offset + i) % PARAGRAPHS.len()].to_string());
        }

        Ok(GeneratedText {
            title,
            content: paragraphs.join("\n\n"),
        })
    }
}

#[async_trait]
impl CoverImagePort for FakeProvider {
    async fn generate_cover_image(&self, request: &CoverRequest) -> Result<String, GenerationError> {
        self.simulate_latency().await;
        Ok(format!("fake://covers/{}/front.png", slug(&request.title)))
    }

    async fn generate_back_cover_image(
        &self,
        request: &CoverRequest,
        _model_override: Option<&str>,
        _branding: Option<&BrandingOptions>,
    ) -> Result<String, GenerationError> {
        self.simulate_latency().await;
        Ok(format!("fake://covers/{}/back.png", slug(&request.title)))
    }
}

#[async_trait]
impl BibliographyPort for FakeProvider {
    async fn generate_references(
        &self,
        outline: &Outline,
        chapter_titles: &[String],
        style: CitationStyle,
    ) -> Result<Vec<Reference>, GenerationError> {
        self.simulate_latency().await;
        Ok(chapter_titles
            .iter()
            .take(3)
            .map(|title| Reference {
                citation: format!("{} ({}). {}: notes on \"{}\".", outline.author, style.as_str(), outline.title, title),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{count_words, sample_outline, sanitize};

    fn instant() -> FakeProvider {
        FakeProvider::new(FakeProviderConfig {
            latency: Duration::ZERO,
            paragraphs_per_chapter: 4,
        })
    }

    #[tokio::test]
    async fn test_chapter_is_deterministic_and_clean() {
        let provider = instant();
        let outline = sample_outline(2);
        let request = ChapterRequest {
            outline: &outline,
            chapter_number: 2,
            preceding_context: "",
            model_id: "fake",
            bibliography: None,
        };

        let a = provider.generate_chapter(request).await.unwrap();
        let b = provider.generate_chapter(request).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.title, "Chapter Title 2");
        assert_eq!(sanitize(&a.content), a.content);
        assert!(count_words(&a.content) > 20);
    }

    #[tokio::test]
    async fn test_batch_uses_default_fan_out() {
        let provider = instant();
        let outline = sample_outline(4);
        let chapters = provider
            .generate_chapter_batch(&outline, &[3, 4], "ctx", "fake", None, None)
            .await
            .unwrap();
        assert_eq!(chapters.iter().map(|c| c.chapter_number).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_cover_urls() {
        let provider = instant();
        let request = CoverRequest {
            title: "The Lighthouse Keeper!".to_string(),
            author: String::new(),
            genre: String::new(),
            description: String::new(),
            style_hint: String::new(),
        };
        assert_eq!(
            provider.generate_cover_image(&request).await.unwrap(),
            "fake://covers/the-lighthouse-keeper/front.png"
        );
        assert!(provider
            .generate_back_cover_image(&request, None, None)
            .await
            .unwrap()
            .ends_with("back.png"));
    }
}
