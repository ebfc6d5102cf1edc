//! Tomeforge - 整书生成编排服务
//!
//! 启动顺序：配置 → 日志 → 持久化 → 提供方 → 编排器 → HTTP 服务器

use std::sync::Arc;
use std::time::Duration;

use tomeforge::application::{
    BibliographyPort, BookRepositoryPort, BrandingOptions, CoverImagePort, GenerationOrchestrator,
    ModelPresets, OrchestratorOptions, TextGeneratorPort,
};
use tomeforge::config::{load_config, print_config, AppConfig, ProviderKind, StorageBackend};
use tomeforge::infrastructure::adapters::{
    FakeProvider, OpenAiClientConfig, OpenAiCompatClient,
};
use tomeforge::infrastructure::http::{AppState, HttpServer, ServerConfig};
use tomeforge::infrastructure::memory::InMemoryBookRepository;
use tomeforge::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteBookRepository,
};

type Providers = (
    Arc<dyn TextGeneratorPort>,
    Arc<dyn CoverImagePort>,
    Arc<dyn BibliographyPort>,
);

fn init_logging(config: &AppConfig) {
    let log_filter = format!(
        "{},tomeforge={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn BookRepositoryPort>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, books are lost on restart");
            Ok(Arc::new(InMemoryBookRepository::new()))
        }
        StorageBackend::Sqlite => {
            // 确保数据目录存在
            if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let db_config = DatabaseConfig::new(&config.database.path, config.database.max_connections);
            let pool = create_pool(&db_config).await?;
            run_migrations(&pool).await?;
            Ok(Arc::new(SqliteBookRepository::new(pool)))
        }
    }
}

fn build_providers(config: &AppConfig) -> anyhow::Result<Providers> {
    match config.provider.kind {
        ProviderKind::Fake => {
            let provider = Arc::new(FakeProvider::with_defaults());
            let text: Arc<dyn TextGeneratorPort> = provider.clone();
            let images: Arc<dyn CoverImagePort> = provider.clone();
            let bibliography: Arc<dyn BibliographyPort> = provider;
            Ok((text, images, bibliography))
        }
        ProviderKind::Openai => {
            if !config.provider.has_api_key() {
                tracing::warn!("Provider API key missing, generation requests will fail");
            }
            let client_config = OpenAiClientConfig {
                base_url: config.provider.base_url.clone(),
                api_key: config.provider.api_key.clone(),
                timeout_secs: config.provider.timeout_secs,
                image_model: config.provider.image_model.clone(),
                text_model: config.provider.models.balanced.clone(),
                max_context_chars: config.generation.max_context_chars,
            };
            let client = Arc::new(OpenAiCompatClient::new(client_config)?);
            let text: Arc<dyn TextGeneratorPort> = client.clone();
            let images: Arc<dyn CoverImagePort> = client.clone();
            let bibliography: Arc<dyn BibliographyPort> = client;
            Ok((text, images, bibliography))
        }
    }
}

fn orchestrator_options(config: &AppConfig) -> OrchestratorOptions {
    OrchestratorOptions {
        batch_size: config.generation.batch_size,
        max_cover_attempts: config.generation.max_cover_attempts,
        models: ModelPresets {
            fast: config.provider.models.fast.clone(),
            balanced: config.provider.models.balanced.clone(),
            quality: config.provider.models.quality.clone(),
        },
        back_cover_model: config.provider.back_cover_model.clone(),
        branding: BrandingOptions {
            publisher: config.covers.publisher.clone(),
            tagline: config.covers.tagline.clone(),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_logging(&config);

    tracing::info!("Tomeforge - book generation service");
    print_config(&config);

    let repo = build_repository(&config).await?;
    let (text, images, bibliography) = build_providers(&config)?;

    let orchestrator = Arc::new(GenerationOrchestrator::new(
        repo,
        text,
        images,
        bibliography,
        orchestrator_options(&config),
    ));

    let state = AppState::new(orchestrator, Duration::from_secs(config.generation.heartbeat_secs));

    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let server = HttpServer::new(server_config, state);

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
