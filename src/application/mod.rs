//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（文本生成、封面、参考文献、书籍仓储）
//! - generation: 生成核心（阶段、进度、批次调度、编排器、流式事件）
//! - commands: CQRS 命令及处理器（增量 / 流式两种传输）
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod generation;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    handlers::{AdvanceGenerationHandler, StreamGenerationHandler, StreamHandle},
    GenerateBookCommand, GenerationStepResponse,
};

pub use error::ApplicationError;

pub use generation::{GenerationEvent, GenerationOrchestrator, ModelPresets, OrchestratorOptions, Phase};

pub use ports::{
    // Providers
    BibliographyPort,
    BrandingOptions,
    CoverImagePort,
    GenerationError,
    TextGeneratorPort,
    // Repository
    BookMetadata,
    BookPatch,
    BookRecord,
    BookRepositoryPort,
    BookStatus,
    ChapterRecord,
    RepositoryError,
};

pub use queries::{
    handlers::{BookProgressView, ChapterSummary, GetBookProgressHandler},
    GetBookProgress,
};
