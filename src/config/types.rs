//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 文本/图像提供方配置
    #[serde(default)]
    pub provider: ProviderConfig,

    /// 生成调度配置
    #[serde(default)]
    pub generation: GenerationConfig,

    /// 封底品牌信息
    #[serde(default)]
    pub covers: CoversConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 存储后端
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 提供方类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI 兼容 HTTP 接口
    Openai,
    /// 离线确定性提供方
    #[default]
    Fake,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Fake => "fake",
        }
    }
}

/// 速度预设对应的模型
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_fast_model")]
    pub fast: String,
    #[serde(default = "default_balanced_model")]
    pub balanced: String,
    #[serde(default = "default_quality_model")]
    pub quality: String,
}

fn default_fast_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_balanced_model() -> String {
    "gpt-4o".to_string()
}

fn default_quality_model() -> String {
    "gpt-4.1".to_string()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            fast: default_fast_model(),
            balanced: default_balanced_model(),
            quality: default_quality_model(),
        }
    }
}

/// 提供方配置
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    /// API 基础 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API Key；缺失时生成请求直接以致命错误结束
    #[serde(default)]
    pub api_key: Option<String>,

    /// 请求超时时间（秒）
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// 封面模型
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// 封底模型覆盖
    #[serde(default)]
    pub back_cover_model: Option<String>,

    #[serde(default)]
    pub models: ModelsConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_provider_timeout() -> u64 {
    180
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_provider_timeout(),
            image_model: default_image_model(),
            back_cover_model: None,
            models: ModelsConfig::default(),
        }
    }
}

impl ProviderConfig {
    /// API Key 是否已设置（非空）
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// 生成调度配置
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// 每批章节数
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// SSE 心跳间隔（秒）
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// 前文上下文字符上限
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// 封面最多尝试次数
    #[serde(default = "default_max_cover_attempts")]
    pub max_cover_attempts: u32,
}

fn default_batch_size() -> usize {
    4
}

fn default_heartbeat() -> u64 {
    15
}

fn default_max_context_chars() -> usize {
    24_000
}

fn default_max_cover_attempts() -> u32 {
    3
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            heartbeat_secs: default_heartbeat(),
            max_context_chars: default_max_context_chars(),
            max_cover_attempts: default_max_cover_attempts(),
        }
    }
}

/// 封底品牌信息
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoversConfig {
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/tomeforge.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    /// 进程内存储，重启即丢失
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5070);
        assert_eq!(config.provider.kind, ProviderKind::Fake);
        assert_eq!(config.generation.batch_size, 4);
        assert_eq!(config.generation.heartbeat_secs, 15);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.database.path, "data/tomeforge.db");
        assert_eq!(config.provider.models.quality, "gpt-4.1");
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:5070");
    }

    #[test]
    fn test_blank_api_key_is_unset() {
        let mut provider = ProviderConfig::default();
        assert!(!provider.has_api_key());
        provider.api_key = Some("   ".to_string());
        assert!(!provider.has_api_key());
        provider.api_key = Some("sk-test".to_string());
        assert!(provider.has_api_key());
    }

    #[test]
    fn test_enums_deserialize_lowercase() {
        let kind: ProviderKind = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(kind, ProviderKind::Openai);
        let backend: StorageBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, StorageBackend::Memory);
    }
}
