//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, ProviderKind, StorageBackend};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 批次大小上限
const MAX_BATCH_SIZE: usize = 16;

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `TOMEFORGE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `TOMEFORGE_SERVER__PORT=8080`
/// - `TOMEFORGE_PROVIDER__KIND=openai`
/// - `TOMEFORGE_PROVIDER__API_KEY=sk-...`
/// - `TOMEFORGE_GENERATION__BATCH_SIZE=6`
/// - `TOMEFORGE_STORAGE__BACKEND=memory`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("provider.kind", "fake")?
        .set_default("provider.base_url", "https://api.openai.com/v1")?
        .set_default("provider.timeout_secs", 180)?
        .set_default("provider.image_model", "dall-e-3")?
        .set_default("provider.models.fast", "gpt-4o-mini")?
        .set_default("provider.models.balanced", "gpt-4o")?
        .set_default("provider.models.quality", "gpt-4.1")?
        .set_default("generation.batch_size", 4)?
        .set_default("generation.heartbeat_secs", 15)?
        .set_default("generation.max_context_chars", 24_000)?
        .set_default("generation.max_cover_attempts", 3)?
        .set_default("database.path", "data/tomeforge.db")?
        .set_default("database.max_connections", 5)?
        .set_default("storage.backend", "sqlite")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: TOMEFORGE_PROVIDER__API_KEY=sk-...
    builder = builder.add_source(
        Environment::with_prefix("TOMEFORGE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    let batch_size = config.generation.batch_size;
    if !(1..=MAX_BATCH_SIZE).contains(&batch_size) {
        return Err(ConfigError::ValidationError(format!(
            "Batch size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, batch_size
        )));
    }

    if config.generation.heartbeat_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Heartbeat interval cannot be 0".to_string(),
        ));
    }

    if config.generation.max_context_chars < 1000 {
        return Err(ConfigError::ValidationError(
            "Context budget must be at least 1000 characters".to_string(),
        ));
    }

    if config.generation.max_cover_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "Max cover attempts must be at least 1".to_string(),
        ));
    }

    if config.storage.backend == StorageBackend::Sqlite && config.database.path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Database path cannot be empty".to_string(),
        ));
    }

    if config.provider.kind == ProviderKind::Openai && config.provider.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Provider base URL cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("Provider: {}", config.provider.kind.as_str());
    if config.provider.kind == ProviderKind::Openai {
        tracing::info!("Provider URL: {}", config.provider.base_url);
        tracing::info!("Provider API Key: {}", if config.provider.has_api_key() { "set" } else { "missing" });
        tracing::info!("Provider Timeout: {}s", config.provider.timeout_secs);
    }
    tracing::info!(
        "Models: fast={}, balanced={}, quality={}",
        config.provider.models.fast,
        config.provider.models.balanced,
        config.provider.models.quality
    );
    tracing::info!("Batch Size: {}", config.generation.batch_size);
    tracing::info!("Heartbeat: {}s", config.generation.heartbeat_secs);
    tracing::info!("Max Cover Attempts: {}", config.generation.max_cover_attempts);
    tracing::info!("Storage: {}", config.storage.backend.as_str());
    if config.storage.backend == StorageBackend::Sqlite {
        tracing::info!("Database: {}", config.database.path);
        tracing::info!("Database Max Connections: {}", config.database.max_connections);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_batch_size() {
        let mut config = AppConfig::default();
        config.generation.batch_size = 0;
        assert!(validate_config(&config).is_err());
        config.generation.batch_size = 17;
        assert!(validate_config(&config).is_err());
        config.generation.batch_size = 16;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_heartbeat() {
        let mut config = AppConfig::default();
        config.generation.heartbeat_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_db_path_only_matters_for_sqlite() {
        let mut config = AppConfig::default();
        config.database.path = String::new();
        assert!(validate_config(&config).is_err());

        config.storage.backend = StorageBackend::Memory;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_empty_openai_url() {
        let mut config = AppConfig::default();
        config.provider.base_url = String::new();
        assert!(validate_config(&config).is_ok());

        config.provider.kind = ProviderKind::Openai;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8088

[provider]
kind = "openai"
api_key = "sk-test"

[provider.models]
fast = "tiny-model"

[generation]
batch_size = 2

[storage]
backend = "memory"
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.provider.kind, ProviderKind::Openai);
        assert!(config.provider.has_api_key());
        assert_eq!(config.provider.models.fast, "tiny-model");
        assert_eq!(config.provider.models.balanced, "gpt-4o");
        assert_eq!(config.generation.batch_size, 2);
        assert_eq!(config.generation.heartbeat_secs, 15);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_invalid_file_value_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[generation]\nbatch_size = 40").unwrap();

        let result = load_config_from_path(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
