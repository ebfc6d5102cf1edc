//! Tomeforge - 整书生成编排服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Book Context: 大纲、生成配置、大纲校验
//! - Text: 章节清洗、前文上下文构建
//! - Failure: 失败分类
//!
//! 应用层 (application/):
//! - Ports: 端口定义（BookRepository, TextGenerator, CoverImage, Bibliography）
//! - Generation: 阶段推导、进度计算、批次调度、编排器、SSE 事件
//! - Commands / Queries: CQRS 处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: 增量 JSON 接口 + SSE 流式接口
//! - Persistence: SQLite 存储
//! - Memory: 内存存储
//! - Adapters: OpenAI 兼容客户端、离线 Fake 提供方

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
