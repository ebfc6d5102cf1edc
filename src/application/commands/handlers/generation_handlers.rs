//! Generation Command Handlers

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use crate::application::commands::{GenerateBookCommand, GenerationStepResponse};
use crate::application::error::ApplicationError;
use crate::application::generation::{run_stream, EventEmitter, GenerationEvent, GenerationOrchestrator, StepDetail};

// ============================================================================
// AdvanceGeneration (增量模式)
// ============================================================================

/// 增量推进 Handler：每次调用恰好推进一个工作单元
pub struct AdvanceGenerationHandler {
    orchestrator: Arc<GenerationOrchestrator>,
}

impl AdvanceGenerationHandler {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn handle(&self, command: GenerateBookCommand) -> Result<GenerationStepResponse, ApplicationError> {
        let report = self.orchestrator.advance(&command).await?;

        let failed_chapters = match &report.detail {
            StepDetail::Batch(outcome) => outcome.failed_numbers(),
            _ => Vec::new(),
        };
        let finished = matches!(report.detail, StepDetail::Finalized { .. });

        tracing::info!(
            book_id = %report.book.id,
            phase = report.phase.as_str(),
            progress = report.snapshot.percent,
            "Generation step finished"
        );

        Ok(GenerationStepResponse {
            phase: report.phase,
            book_id: report.book.id,
            chapters_completed: report.snapshot.chapters_completed,
            total_chapters: report.snapshot.total_chapters,
            progress: report.snapshot.percent,
            message: report.snapshot.message,
            failed_chapters,
            book: finished.then_some(report.book),
        })
    }
}

// ============================================================================
// StreamGeneration (流式模式)
// ============================================================================

/// 流式运行句柄
pub struct StreamHandle {
    pub events: UnboundedReceiver<GenerationEvent>,
    /// 连接断开时取消
    pub cancel: CancellationToken,
}

/// 流式生成 Handler：后台任务跑完整个流程
pub struct StreamGenerationHandler {
    orchestrator: Arc<GenerationOrchestrator>,
}

impl StreamGenerationHandler {
    pub fn new(orchestrator: Arc<GenerationOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// 启动运行；断开后任务仍会把已发起的调用跑完并落盘
    pub fn handle(&self, command: GenerateBookCommand) -> StreamHandle {
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let emitter = EventEmitter::new(tx, cancel.clone());
        let orchestrator = self.orchestrator.clone();

        tokio::spawn(async move {
            run_stream(&orchestrator, command, &emitter).await;
        });

        StreamHandle { events, cancel }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generation::test_support::ScriptedProvider;
    use crate::application::generation::{OrchestratorOptions, Phase};
    use crate::domain::{sample_outline, BookSettings};
    use crate::infrastructure::memory::InMemoryBookRepository;

    fn orchestrator(provider: &Arc<ScriptedProvider>) -> Arc<GenerationOrchestrator> {
        Arc::new(GenerationOrchestrator::new(
            Arc::new(InMemoryBookRepository::new()),
            provider.clone(),
            provider.clone(),
            provider.clone(),
            OrchestratorOptions::default(),
        ))
    }

    fn command(chapters: u32) -> GenerateBookCommand {
        GenerateBookCommand {
            user_id: "user-1".to_string(),
            outline: sample_outline(chapters),
            settings: BookSettings::default(),
            book_id: None,
        }
    }

    #[tokio::test]
    async fn test_advance_reports_book_only_on_completion() {
        let provider = Arc::new(ScriptedProvider::new());
        let handler = AdvanceGenerationHandler::new(orchestrator(&provider));
        let mut cmd = command(1);

        let created = handler.handle(cmd.clone()).await.unwrap();
        assert_eq!(created.phase, Phase::Creating);
        assert!(created.book.is_none());
        cmd.book_id = Some(created.book_id);

        let mut last = created;
        while last.phase != Phase::Completed {
            last = handler.handle(cmd.clone()).await.unwrap();
        }
        assert_eq!(last.progress, 100);
        assert!(last.book.is_some());
    }

    #[tokio::test]
    async fn test_advance_reports_failed_chapters() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.fail_chapter_always(2);
        let handler = AdvanceGenerationHandler::new(orchestrator(&provider));
        let mut cmd = command(3);

        let created = handler.handle(cmd.clone()).await.unwrap();
        cmd.book_id = Some(created.book_id);
        let step = handler.handle(cmd).await.unwrap();
        assert_eq!(step.failed_chapters, vec![2]);
        assert_eq!(step.chapters_completed, 2);
    }

    #[tokio::test]
    async fn test_stream_handle_ends_with_terminal_event() {
        let provider = Arc::new(ScriptedProvider::new());
        let handler = StreamGenerationHandler::new(orchestrator(&provider));

        let mut handle = handler.handle(command(2));
        let mut last = None;
        while let Some(event) = handle.events.recv().await {
            last = Some(event);
        }
        assert_eq!(last.map(|e| e.name()), Some("complete"));
    }
}
