//! OpenAI 兼容客户端
//!
//! 实现 TextGeneratorPort、CoverImagePort、BibliographyPort
//!
//! 外部 API:
//! POST {base_url}/chat/completions   章节正文、参考文献
//! POST {base_url}/images/generations 封面、封底
//!
//! 错误文本保留 HTTP 状态码与响应体，供失败分类器匹配

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{
    BibliographyPort, BrandingOptions, ChapterRequest, CoverImagePort, CoverRequest, GeneratedText,
    GenerationError, Reference, TextGeneratorPort,
};
use crate::domain::{build_context, CitationStyle, ContextChapter, Outline, DEFAULT_MAX_CONTEXT_CHARS};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

/// OpenAI 兼容客户端配置
#[derive(Debug, Clone)]
pub struct OpenAiClientConfig {
    /// API 基础 URL
    pub base_url: String,
    pub api_key: Option<String>,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 封面模型
    pub image_model: String,
    /// 参考文献使用的模型
    pub text_model: String,
    /// 前文上下文字符上限
    pub max_context_chars: usize,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout_secs: 180,
            image_model: "dall-e-3".to_string(),
            text_model: "gpt-4o".to_string(),
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

impl OpenAiClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// OpenAI 兼容客户端
pub struct OpenAiCompatClient {
    client: Client,
    config: OpenAiClientConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| GenerationError::NotConfigured("provider API key is not configured".to_string()))
    }

    async fn post_json<Req: Serialize + Sync, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, GenerationError> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(url = %url, status = status.as_u16(), "Provider returned error status");
            return Err(GenerationError::Service {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| GenerationError::InvalidResponse(format!("Failed to decode response: {}", e)))
    }

    async fn chat(&self, model: &str, system: &str, user: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.8,
        };

        let response: ChatResponse = self.post_json("chat/completions", &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("chat response has no content".to_string()))
    }

    async fn image(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let request = ImageRequest {
            model,
            prompt,
            n: 1,
            size: "1024x1792",
        };

        let response: ImageResponse = self.post_json("images/generations", &request).await?;
        response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| GenerationError::InvalidResponse("image response has no url".to_string()))
    }
}

fn map_send_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else if e.is_connect() {
        GenerationError::Network(format!("Cannot connect to provider: {}", e))
    } else {
        GenerationError::Network(e.to_string())
    }
}

const CHAPTER_SYSTEM_PROMPT: &str = "You are a novelist writing one chapter of a longer book. \
Write continuous prose only: no chapter heading, no markdown, no commentary.";

/// 单章提示词
fn chapter_prompt(request: &ChapterRequest<'_>) -> String {
    let outline = request.outline;
    let mut prompt = format!(
        "Book: \"{}\" by {}\nGenre: {}\nPremise: {}\n",
        outline.title, outline.author, outline.genre, outline.description
    );

    if let Some(stub) = outline.chapter(request.chapter_number) {
        prompt.push_str(&format!(
            "\nWrite chapter {} of {}: \"{}\"\nSummary: {}\n",
            stub.number,
            outline.total_chapters(),
            stub.title,
            stub.summary
        ));
        if let Some(words) = stub.target_word_count {
            prompt.push_str(&format!("Target length: about {} words.\n", words));
        }
    }

    if let Some(bib) = request.bibliography.filter(|b| b.enabled) {
        prompt.push_str(&format!(
            "Cite sources inline using {} style where appropriate.\n",
            bib.citation_style.as_str()
        ));
    }

    if !request.preceding_context.is_empty() {
        prompt.push_str("\nStory so far:\n");
        prompt.push_str(request.preceding_context);
        prompt.push('\n');
    }

    prompt
}

fn cover_prompt(request: &CoverRequest) -> String {
    format!(
        "Front cover art for the {} book \"{}\" by {}. {}. Style: {}. No text other than the title and author.",
        request.genre, request.title, request.author, request.description, request.style_hint
    )
}

fn back_cover_prompt(request: &CoverRequest, branding: Option<&BrandingOptions>) -> String {
    let mut prompt = format!(
        "Back cover art matching the front cover of \"{}\" ({}). Style: {}. Leave space for a blurb.",
        request.title, request.genre, request.style_hint
    );
    if let Some(publisher) = branding.and_then(|b| b.publisher.as_deref()) {
        prompt.push_str(&format!(" Publisher mark: {}.", publisher));
    }
    if let Some(tagline) = branding.and_then(|b| b.tagline.as_deref()) {
        prompt.push_str(&format!(" Tagline: \"{}\".", tagline));
    }
    prompt
}

/// 每行一条参考文献，去掉编号与列表符号
fn parse_references(text: &str) -> Vec<Reference> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*'))
                .trim()
        })
        .filter(|line| !line.is_empty())
        .map(|line| Reference {
            citation: line.to_string(),
        })
        .collect()
}

#[async_trait]
impl TextGeneratorPort for OpenAiCompatClient {
    fn ensure_ready(&self) -> Result<(), GenerationError> {
        self.api_key().map(|_| ())
    }

    async fn generate_chapter(&self, request: ChapterRequest<'_>) -> Result<GeneratedText, GenerationError> {
        let prompt = chapter_prompt(&request);

        tracing::debug!(
            chapter = request.chapter_number,
            model = %request.model_id,
            prompt_len = prompt.len(),
            "Sending chapter generation request"
        );

        let content = self.chat(request.model_id, CHAPTER_SYSTEM_PROMPT, &prompt).await?;
        let title = request
            .outline
            .chapter(request.chapter_number)
            .map(|c| c.title.clone())
            .unwrap_or_default();

        tracing::info!(
            chapter = request.chapter_number,
            content_len = content.len(),
            "Chapter generation completed"
        );

        Ok(GeneratedText { title, content })
    }

    fn build_chapter_context(&self, chapters: &[ContextChapter<'_>]) -> String {
        build_context(chapters, self.config.max_context_chars)
    }
}

#[async_trait]
impl CoverImagePort for OpenAiCompatClient {
    async fn generate_cover_image(&self, request: &CoverRequest) -> Result<String, GenerationError> {
        let url = self.image(&self.config.image_model, &cover_prompt(request)).await?;
        tracing::info!(title = %request.title, "Front cover generated");
        Ok(url)
    }

    async fn generate_back_cover_image(
        &self,
        request: &CoverRequest,
        model_override: Option<&str>,
        branding: Option<&BrandingOptions>,
    ) -> Result<String, GenerationError> {
        let model = model_override.unwrap_or(&self.config.image_model);
        let url = self.image(model, &back_cover_prompt(request, branding)).await?;
        tracing::info!(title = %request.title, model = %model, "Back cover generated");
        Ok(url)
    }
}

#[async_trait]
impl BibliographyPort for OpenAiCompatClient {
    async fn generate_references(
        &self,
        outline: &Outline,
        chapter_titles: &[String],
        style: CitationStyle,
    ) -> Result<Vec<Reference>, GenerationError> {
        let prompt = format!(
            "List 5 to 10 plausible sources for a {} book titled \"{}\" covering: {}. \
             Format each as a {} citation on its own line, nothing else.",
            outline.genre,
            outline.title,
            chapter_titles.join("; "),
            style.as_str()
        );
        let text = self
            .chat(&self.config.text_model, "You are a meticulous research librarian.", &prompt)
            .await?;
        Ok(parse_references(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{sample_outline, BibliographySettings};

    #[test]
    fn test_config_default() {
        let config = OpenAiClientConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.timeout_secs, 180);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_missing_api_key_is_not_configured() {
        let client = OpenAiCompatClient::new(OpenAiClientConfig::default()).unwrap();
        assert!(matches!(client.ensure_ready(), Err(GenerationError::NotConfigured(_))));

        let blank = OpenAiCompatClient::new(OpenAiClientConfig::new("http://x", Some("  ".to_string()))).unwrap();
        assert!(blank.ensure_ready().is_err());

        let ready =
            OpenAiCompatClient::new(OpenAiClientConfig::new("http://x/", Some("sk-1".to_string())).with_timeout(30))
                .unwrap();
        assert!(ready.ensure_ready().is_ok());
        assert_eq!(ready.url("chat/completions"), "http://x/chat/completions");
    }

    #[test]
    fn test_chapter_prompt_includes_context_and_summary() {
        let outline = sample_outline(3);
        let bib = BibliographySettings {
            enabled: true,
            citation_style: CitationStyle::Mla,
        };
        let request = ChapterRequest {
            outline: &outline,
            chapter_number: 2,
            preceding_context: "Chapter 1: Chapter Title 1\nIt began.",
            model_id: "m",
            bibliography: Some(&bib),
        };

        let prompt = chapter_prompt(&request);
        assert!(prompt.contains("Write chapter 2 of 3"));
        assert!(prompt.contains("Story so far:\nChapter 1: Chapter Title 1"));
        assert!(prompt.contains("mla style"));
    }

    #[test]
    fn test_parse_references_strips_markers() {
        let refs = parse_references("1. Smith, J. (2020). Waves.\n\n- Doe, A. Tides.\n");
        assert_eq!(
            refs,
            vec![
                Reference {
                    citation: "Smith, J. (2020). Waves.".to_string()
                },
                Reference {
                    citation: "Doe, A. Tides.".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_back_cover_prompt_branding() {
        let request = CoverRequest {
            title: "T".to_string(),
            author: "A".to_string(),
            genre: "fantasy".to_string(),
            description: "D".to_string(),
            style_hint: "engaging".to_string(),
        };
        let branding = BrandingOptions {
            publisher: Some("Lantern Press".to_string()),
            tagline: None,
        };
        let prompt = back_cover_prompt(&request, Some(&branding));
        assert!(prompt.contains("Lantern Press"));
        assert!(!prompt.contains("Tagline"));
    }

    #[test]
    fn test_chat_response_decoding() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Once upon a time"}}]}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("Once upon a time"));
    }
}
