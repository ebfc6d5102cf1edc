//! Cover Image Port - 封面生成抽象

use async_trait::async_trait;

use super::text_generator::GenerationError;

/// 封面请求
#[derive(Debug, Clone)]
pub struct CoverRequest {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    /// 风格提示
    pub style_hint: String,
}

/// 封底品牌信息
#[derive(Debug, Clone, Default)]
pub struct BrandingOptions {
    pub publisher: Option<String>,
    pub tagline: Option<String>,
}

/// Cover Image Port
#[async_trait]
pub trait CoverImagePort: Send + Sync {
    /// 生成封面，返回图片 URL
    async fn generate_cover_image(&self, request: &CoverRequest) -> Result<String, GenerationError>;

    /// 生成封底，返回图片 URL
    async fn generate_back_cover_image(
        &self,
        request: &CoverRequest,
        model_override: Option<&str>,
        branding: Option<&BrandingOptions>,
    ) -> Result<String, GenerationError>;
}
