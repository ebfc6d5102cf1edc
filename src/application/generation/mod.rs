//! 生成核心
//!
//! - phase: 从持久化状态推导阶段
//! - progress: 进度计算
//! - scheduler: 批次调度（并行 + 顺序回退）
//! - orchestrator: 两种传输方式共享的状态机
//! - stream / events: 流式运行与事件

pub mod events;
pub mod orchestrator;
pub mod phase;
pub mod progress;
pub mod scheduler;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_support;

pub use events::{CoverSide, EventError, GenerationEvent};
pub use orchestrator::{
    BatchStep, CoverAttempt, CoverOutcome, GenerationOrchestrator, ModelPresets, OrchestratorOptions,
    RunState, StepDetail, StepReport,
};
pub use phase::{completed_count, derive_phase, derive_phase_with, missing_chapters, Phase, DEFAULT_MAX_COVER_ATTEMPTS};
pub use progress::{compute_progress, Progress, ProgressSnapshot, ProgressTracker};
pub use scheduler::{
    BatchObserver, BatchOutcome, BatchRequest, BatchScheduler, ChapterFailure, ChapterResult, ExecutionMode,
};
pub use stream::{run_stream, EventEmitter};
