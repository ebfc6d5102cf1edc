//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;
use std::time::Duration;

use crate::application::{
    // Command handlers
    AdvanceGenerationHandler, StreamGenerationHandler,
    // Query handlers
    GetBookProgressHandler,
    // Core
    GenerationOrchestrator,
};

/// 应用状态
pub struct AppState {
    // ========== Core ==========
    pub orchestrator: Arc<GenerationOrchestrator>,
    /// SSE 心跳间隔
    pub heartbeat: Duration,

    // ========== Command Handlers ==========
    pub advance_handler: AdvanceGenerationHandler,
    pub stream_handler: StreamGenerationHandler,

    // ========== Query Handlers ==========
    pub book_progress_handler: GetBookProgressHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(orchestrator: Arc<GenerationOrchestrator>, heartbeat: Duration) -> Self {
        Self {
            orchestrator: orchestrator.clone(),
            heartbeat,

            // Command handlers
            advance_handler: AdvanceGenerationHandler::new(orchestrator.clone()),
            stream_handler: StreamGenerationHandler::new(orchestrator.clone()),

            // Query handlers
            book_progress_handler: GetBookProgressHandler::new(orchestrator),
        }
    }
}
