//! 流式驱动
//!
//! 一次连接跑完整个流程：创建 → 所有剩余批次 → 封面 → 收尾。
//! 事件通过无界通道同步发出；取消令牌在每次发出前检查，
//! 一旦取消就不再发出任何事件，但已发起的生成调用仍会完成并持久化。

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::events::{CoverSide, EventError, GenerationEvent};
use super::orchestrator::{CoverAttempt, GenerationOrchestrator};
use super::phase::{completed_count, missing_chapters, Phase};
use super::progress::{compute_progress, ProgressTracker};
use super::scheduler::{BatchObserver, ChapterFailure, ChapterResult};
use crate::application::commands::GenerateBookCommand;
use crate::application::error::ApplicationError;
use crate::domain::{classify, classify_error, ClassifiedFailure};

/// 事件发送器
pub struct EventEmitter {
    tx: UnboundedSender<GenerationEvent>,
    cancel: CancellationToken,
    tracker: ProgressTracker,
}

impl EventEmitter {
    pub fn new(tx: UnboundedSender<GenerationEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            tracker: ProgressTracker::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// 发出事件；已取消时静默丢弃并返回 false
    pub fn emit(&self, event: GenerationEvent) -> bool {
        if self.is_cancelled() {
            return false;
        }
        tracing::debug!(event = event.name(), "Emitting event");
        self.tx.send(event).is_ok()
    }

    /// 单调化的进度
    pub fn progress(&self, percent: u8) -> u8 {
        self.tracker.observe(percent)
    }
}

/// 把批次回调转成章节事件
struct StreamObserver<'a> {
    emitter: &'a EventEmitter,
    book_id: Uuid,
    batch_number: usize,
    chapters: Vec<u32>,
    completed_before: usize,
    total_chapters: usize,
}

impl BatchObserver for StreamObserver<'_> {
    fn on_chapter_done(&self, chapter: &ChapterResult, done_in_batch: usize) {
        let done = (self.completed_before + done_in_batch).min(self.total_chapters);
        let progress = compute_progress(Phase::Generating, done, self.total_chapters);
        self.emitter.emit(GenerationEvent::ChapterProgress {
            book_id: self.book_id,
            chapter_number: chapter.number,
            title: chapter.title.clone(),
            word_count: chapter.word_count,
            chapters_completed: done,
            total_chapters: self.total_chapters,
            progress: self.emitter.progress(progress.percent),
            message: format!("Chapter {} complete: {}", chapter.number, chapter.title),
        });
    }

    fn on_chapter_error(&self, failure: &ChapterFailure) {
        self.emitter.emit(GenerationEvent::ChapterError {
            book_id: self.book_id,
            chapter_number: failure.number,
            error: EventError::from(&failure.failure),
        });
    }

    fn on_parallel_failed(&self, failure: &ClassifiedFailure) {
        self.emitter.emit(GenerationEvent::BatchError {
            book_id: self.book_id,
            batch_number: self.batch_number,
            chapters: self.chapters.clone(),
            fallback: "sequential".to_string(),
            error: EventError::from(failure),
        });
    }
}

/// 驱动一次完整的流式运行
///
/// 错误转为终止 `error` 事件，不会向调用方返回
pub async fn run_stream(orchestrator: &GenerationOrchestrator, cmd: GenerateBookCommand, emitter: &EventEmitter) {
    let mut book_id = cmd.book_id;
    match drive(orchestrator, &cmd, emitter, &mut book_id).await {
        Ok(()) => {
            if emitter.is_cancelled() {
                tracing::info!(book_id = ?book_id, "Stream cancelled by client, results kept");
            }
        }
        Err(e) => {
            let failure = classify_error(&e);
            tracing::error!(book_id = ?book_id, error = %e, kind = failure.kind.as_str(), "Stream generation failed");
            emitter.emit(GenerationEvent::Error {
                book_id,
                progress_preserved: true,
                missing_chapters: Vec::new(),
                error: EventError::from(&failure),
            });
        }
    }
}

async fn drive(
    orchestrator: &GenerationOrchestrator,
    cmd: &GenerateBookCommand,
    emitter: &EventEmitter,
    book_id: &mut Option<Uuid>,
) -> Result<(), ApplicationError> {
    orchestrator.ensure_ready()?;
    let state = orchestrator.load(&cmd.user_id, cmd.book_id).await?;

    let total = cmd.outline.total_chapters();
    let start_phase = orchestrator.phase_of(state.book.as_ref(), &state.chapters);
    let start_done = state
        .book
        .as_ref()
        .map(|b| completed_count(b, &state.chapters))
        .unwrap_or(0);
    let start_total = state.book.as_ref().map(|b| b.total_chapters()).unwrap_or(total);
    let progress = compute_progress(start_phase, start_done, start_total);
    emitter.emit(GenerationEvent::Start {
        book_id: *book_id,
        chapters_completed: start_done,
        total_chapters: start_total,
        progress: emitter.progress(progress.percent),
        message: "Starting book generation".to_string(),
    });

    let mut book = match state.book {
        Some(book) => book,
        None => {
            let book = orchestrator.create_book(cmd).await?;
            *book_id = Some(book.id);
            let created = compute_progress(Phase::Creating, 0, book.total_chapters());
            emitter.emit(GenerationEvent::BookCreated {
                book_id: book.id,
                title: book.outline.title.clone(),
                total_chapters: book.total_chapters(),
                progress: emitter.progress(created.percent),
                message: created.message,
            });
            book
        }
    };
    let mut chapters = state.chapters;
    let total = book.total_chapters();

    let batches = orchestrator.scheduler().plan_batches(&missing_chapters(&book, &chapters));
    let total_batches = batches.len();
    let mut last_failure: Option<ClassifiedFailure> = None;

    for (idx, numbers) in batches.iter().enumerate() {
        if emitter.is_cancelled() {
            return Ok(());
        }
        let batch_number = idx + 1;
        let done_before = completed_count(&book, &chapters);
        emitter.emit(GenerationEvent::BatchStart {
            book_id: book.id,
            batch_number,
            total_batches,
            chapters: numbers.clone(),
            progress: emitter.progress(compute_progress(Phase::Generating, done_before, total).percent),
            message: format!("Starting batch {} of {}", batch_number, total_batches),
        });

        let observer = StreamObserver {
            emitter,
            book_id: book.id,
            batch_number,
            chapters: numbers.clone(),
            completed_before: done_before,
            total_chapters: total,
        };
        let step = orchestrator
            .generate_batch(&book, &chapters, numbers, Some(&observer))
            .await?;
        if let Some(failure) = step.outcome.failures.last() {
            last_failure = Some(failure.failure.clone());
        }
        book = step.book;
        chapters = step.chapters;

        let done = completed_count(&book, &chapters);
        let progress = compute_progress(Phase::Generating, done, total);
        emitter.emit(GenerationEvent::BatchComplete {
            book_id: book.id,
            batch_number,
            total_batches,
            chapters_completed: done,
            total_chapters: total,
            failed_chapters: step.outcome.failed_numbers(),
            progress: emitter.progress(progress.percent),
            message: progress.message,
        });
    }

    if emitter.is_cancelled() {
        return Ok(());
    }

    let missing = missing_chapters(&book, &chapters);
    if !missing.is_empty() {
        let failure = last_failure
            .unwrap_or_else(|| classify(&format!("chapters {:?} could not be generated", missing)));
        tracing::warn!(book_id = %book.id, missing = ?missing, "Run ended with missing chapters");
        emitter.emit(GenerationEvent::Error {
            book_id: Some(book.id),
            progress_preserved: true,
            missing_chapters: missing,
            error: EventError::from(&failure),
        });
        return Ok(());
    }

    if orchestrator.phase_of(Some(&book), &chapters) == Phase::Cover {
        let cover = compute_progress(Phase::Cover, total, total);
        emitter.emit(GenerationEvent::CoversStart {
            book_id: book.id,
            progress: emitter.progress(cover.percent),
            message: cover.message,
        });

        let (outcome, updated) = orchestrator.generate_covers(&book).await?;
        book = updated;
        for (side, attempt) in [(CoverSide::Front, &outcome.front), (CoverSide::Back, &outcome.back)] {
            match attempt {
                CoverAttempt::Generated(url) => {
                    emitter.emit(GenerationEvent::CoverComplete {
                        book_id: book.id,
                        side,
                        url: url.clone(),
                        progress: emitter.progress(cover.percent),
                    });
                }
                CoverAttempt::Failed(failure) => {
                    emitter.emit(GenerationEvent::CoverError {
                        book_id: book.id,
                        side,
                        error: EventError::from(failure),
                    });
                }
                CoverAttempt::AlreadyPresent(_) => {}
            }
        }
    }

    if emitter.is_cancelled() {
        return Ok(());
    }

    let book = orchestrator.finalize(&book, &chapters).await?;
    let done = completed_count(&book, &chapters);
    let complete = compute_progress(Phase::Completed, done, total);
    emitter.emit(GenerationEvent::Complete {
        book_id: book.id,
        chapters_completed: done,
        total_chapters: total,
        progress: emitter.progress(complete.percent),
        message: complete.message,
        book: Box::new(book),
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::generation::orchestrator::OrchestratorOptions;
    use crate::application::generation::test_support::ScriptedProvider;
    use crate::application::ports::{
        BookRepositoryPort, BookStatus, ChapterRequest, GeneratedText, GenerationError, TextGeneratorPort,
    };
    use crate::domain::{sample_outline, BookSettings};
    use crate::infrastructure::memory::InMemoryBookRepository;

    /// 生成指定章节时触发取消（模拟该时刻客户端断开）
    struct CancellingProvider {
        inner: Arc<ScriptedProvider>,
        cancel_on: u32,
        token: CancellationToken,
    }

    #[async_trait]
    impl TextGeneratorPort for CancellingProvider {
        async fn generate_chapter(&self, request: ChapterRequest<'_>) -> Result<GeneratedText, GenerationError> {
            if request.chapter_number == self.cancel_on {
                self.token.cancel();
            }
            self.inner.generate_chapter(request).await
        }
    }

    fn command(chapters: u32) -> GenerateBookCommand {
        GenerateBookCommand {
            user_id: "user-1".to_string(),
            outline: sample_outline(chapters),
            settings: BookSettings::default(),
            book_id: None,
        }
    }

    fn orchestrator_with(
        text: Arc<dyn TextGeneratorPort>,
        provider: &Arc<ScriptedProvider>,
        repo: &Arc<InMemoryBookRepository>,
    ) -> GenerationOrchestrator {
        GenerationOrchestrator::new(
            repo.clone(),
            text,
            provider.clone(),
            provider.clone(),
            OrchestratorOptions::default(),
        )
    }

    async fn collect(
        orchestrator: &GenerationOrchestrator,
        cmd: GenerateBookCommand,
        token: CancellationToken,
    ) -> Vec<GenerationEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let emitter = EventEmitter::new(tx, token);
        run_stream(orchestrator, cmd, &emitter).await;
        drop(emitter);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_full_stream_event_sequence() {
        let provider = Arc::new(ScriptedProvider::new());
        let repo = Arc::new(InMemoryBookRepository::new());
        let orchestrator = orchestrator_with(provider.clone(), &provider, &repo);

        let events = collect(&orchestrator, command(12), CancellationToken::new()).await;
        let names: Vec<&str> = events.iter().map(GenerationEvent::name).collect();

        assert_eq!(names[0], "start");
        assert_eq!(names[1], "book_created");
        assert_eq!(names.iter().filter(|n| **n == "batch_start").count(), 3);
        assert_eq!(names.iter().filter(|n| **n == "chapter_progress").count(), 12);
        assert_eq!(names.iter().filter(|n| **n == "batch_complete").count(), 3);
        assert_eq!(names.iter().filter(|n| **n == "cover_complete").count(), 2);
        assert_eq!(*names.last().unwrap(), "complete");
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        let percents: Vec<u8> = events.iter().filter_map(GenerationEvent::progress).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percents.last().unwrap(), 100);

        let batch_completes: Vec<u8> = events
            .iter()
            .filter(|e| e.name() == "batch_complete")
            .filter_map(GenerationEvent::progress)
            .collect();
        assert_eq!(batch_completes, vec![35, 65, 95]);

        match events.last().unwrap() {
            GenerationEvent::Complete { book, .. } => assert_eq!(book.status, BookStatus::Completed),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start_emits_nothing() {
        let provider = Arc::new(ScriptedProvider::new());
        let repo = Arc::new(InMemoryBookRepository::new());
        let orchestrator = orchestrator_with(provider.clone(), &provider, &repo);
        let token = CancellationToken::new();
        token.cancel();

        let events = collect(&orchestrator, command(4), token).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_during_batch_two_keeps_results() {
        let provider = Arc::new(ScriptedProvider::new());
        let repo = Arc::new(InMemoryBookRepository::new());
        let token = CancellationToken::new();
        let text = Arc::new(CancellingProvider {
            inner: provider.clone(),
            cancel_on: 5,
            token: token.clone(),
        });
        let orchestrator = orchestrator_with(text, &provider, &repo);

        let events = collect(&orchestrator, command(12), token).await;
        match events.last().unwrap() {
            GenerationEvent::BatchStart { batch_number, .. } => assert_eq!(*batch_number, 2),
            other => panic!("unexpected last event {:?}", other),
        }
        assert!(events.iter().all(|e| !e.is_terminal()));

        // 已发起的批次 2 仍然落盘，批次 3 不再开始
        let book_id = match &events[1] {
            GenerationEvent::BookCreated { book_id, .. } => *book_id,
            other => panic!("unexpected event {:?}", other),
        };
        let chapters = repo.get_book_chapters(book_id).await.unwrap();
        assert_eq!(chapters.len(), 8);
        assert!(provider.requested_numbers().iter().all(|n| *n <= 8));

        // 增量续跑从第一个缺失章节开始
        let mut resume = command(12);
        resume.book_id = Some(book_id);
        provider.reset_calls();
        let plain = orchestrator_with(provider.clone(), &provider, &repo);
        plain.advance(&resume).await.unwrap();
        assert_eq!(provider.batch_calls(), vec![vec![9, 10, 11, 12]]);
    }

    #[tokio::test]
    async fn test_gap_ends_stream_with_error_event() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.fail_chapter_always(3);
        provider.set_fail_message("HTTP 429 Too Many Requests");
        let repo = Arc::new(InMemoryBookRepository::new());
        let orchestrator = orchestrator_with(provider.clone(), &provider, &repo);

        let events = collect(&orchestrator, command(4), CancellationToken::new()).await;
        let names: Vec<&str> = events.iter().map(GenerationEvent::name).collect();
        assert!(names.contains(&"batch_error"));
        assert!(names.contains(&"chapter_error"));
        assert!(!names.contains(&"covers_start"));

        match events.last().unwrap() {
            GenerationEvent::Error {
                missing_chapters,
                progress_preserved,
                error,
                ..
            } => {
                assert_eq!(missing_chapters, &vec![3]);
                assert!(*progress_preserved);
                assert_eq!(error.kind, crate::domain::FailureKind::RateLimit);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(provider.cover_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fatal_error_is_single_error_event() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.set_not_configured();
        let repo = Arc::new(InMemoryBookRepository::new());
        let orchestrator = orchestrator_with(provider.clone(), &provider, &repo);

        let events = collect(&orchestrator, command(4), CancellationToken::new()).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            GenerationEvent::Error { book_id, error, .. } => {
                assert!(book_id.is_none());
                assert_eq!(error.kind, crate::domain::FailureKind::Auth);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cover_failure_is_reported_and_run_completes() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.fail_covers(true);
        let repo = Arc::new(InMemoryBookRepository::new());
        let orchestrator = orchestrator_with(provider.clone(), &provider, &repo);

        let events = collect(&orchestrator, command(2), CancellationToken::new()).await;
        let names: Vec<&str> = events.iter().map(GenerationEvent::name).collect();
        assert!(names.contains(&"cover_error"));
        assert!(names.contains(&"cover_complete"));
        assert_eq!(*names.last().unwrap(), "complete");
    }
}
