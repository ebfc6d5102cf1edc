//! 生成编排器
//!
//! 两种传输方式共享的状态机：
//! - 每次调用先从持久化状态推导阶段
//! - 增量模式 [`GenerationOrchestrator::advance`] 只推进一个工作单元
//! - 流式模式复用下面的各个步骤，一次连接跑完全部流程
//!
//! 章节写入只追加，书籍元数据每批读改写一次

use std::sync::Arc;

use uuid::Uuid;

use super::phase::{completed_count, derive_phase_with, missing_chapters, Phase};
use super::progress::ProgressSnapshot;
use super::scheduler::{BatchObserver, BatchOutcome, BatchRequest, BatchScheduler};
use crate::application::commands::GenerateBookCommand;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    BibliographyPort, BibliographySummary, BookMetadata, BookPatch, BookRecord, BookRepositoryPort,
    BookStatus, BrandingOptions, ChapterRecord, CoverImagePort, CoverRequest, TextGeneratorPort,
};
use crate::domain::{classify, BookSettings, ClassifiedFailure, GenerationSpeed};

/// 速度预设对应的模型
#[derive(Debug, Clone)]
pub struct ModelPresets {
    pub fast: String,
    pub balanced: String,
    pub quality: String,
}

impl Default for ModelPresets {
    fn default() -> Self {
        Self {
            fast: "gpt-4o-mini".to_string(),
            balanced: "gpt-4o".to_string(),
            quality: "gpt-4.1".to_string(),
        }
    }
}

impl ModelPresets {
    pub fn for_speed(&self, speed: GenerationSpeed) -> &str {
        match speed {
            GenerationSpeed::Fast => &self.fast,
            GenerationSpeed::Balanced => &self.balanced,
            GenerationSpeed::Quality => &self.quality,
        }
    }
}

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// 批次大小（并行宽度）
    pub batch_size: usize,
    pub max_cover_attempts: u32,
    pub models: ModelPresets,
    pub back_cover_model: Option<String>,
    pub branding: BrandingOptions,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            batch_size: 4,
            max_cover_attempts: super::phase::DEFAULT_MAX_COVER_ATTEMPTS,
            models: ModelPresets::default(),
            back_cover_model: None,
            branding: BrandingOptions::default(),
        }
    }
}

/// 持久化状态快照
#[derive(Debug, Clone)]
pub struct RunState {
    pub book: Option<BookRecord>,
    pub chapters: Vec<ChapterRecord>,
}

/// 一个批次执行并持久化之后的状态
#[derive(Debug, Clone)]
pub struct BatchStep {
    pub outcome: BatchOutcome,
    pub book: BookRecord,
    pub chapters: Vec<ChapterRecord>,
}

/// 单面封面结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverAttempt {
    Generated(String),
    AlreadyPresent(String),
    Failed(ClassifiedFailure),
}

/// 封面阶段结果
#[derive(Debug, Clone)]
pub struct CoverOutcome {
    pub front: CoverAttempt,
    pub back: CoverAttempt,
}

/// 增量步骤的具体内容
#[derive(Debug, Clone)]
pub enum StepDetail {
    Created,
    Batch(BatchOutcome),
    Covers(CoverOutcome),
    Finalized { already_completed: bool },
}

/// 增量推进一步的结果
#[derive(Debug, Clone)]
pub struct StepReport {
    pub phase: Phase,
    pub book: BookRecord,
    pub snapshot: ProgressSnapshot,
    pub detail: StepDetail,
}

/// 生成编排器
pub struct GenerationOrchestrator {
    repo: Arc<dyn BookRepositoryPort>,
    images: Arc<dyn CoverImagePort>,
    bibliography: Arc<dyn BibliographyPort>,
    text: Arc<dyn TextGeneratorPort>,
    scheduler: BatchScheduler,
    options: OrchestratorOptions,
}

impl GenerationOrchestrator {
    pub fn new(
        repo: Arc<dyn BookRepositoryPort>,
        text: Arc<dyn TextGeneratorPort>,
        images: Arc<dyn CoverImagePort>,
        bibliography: Arc<dyn BibliographyPort>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            scheduler: BatchScheduler::new(text.clone(), options.batch_size),
            repo,
            images,
            bibliography,
            text,
            options,
        }
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    pub fn repository(&self) -> &Arc<dyn BookRepositoryPort> {
        &self.repo
    }

    /// 提供方凭据缺失属于致命错误，运行不会开始
    pub fn ensure_ready(&self) -> Result<(), ApplicationError> {
        self.text.ensure_ready().map_err(ApplicationError::from)
    }

    /// 推导阶段
    pub fn phase_of(&self, book: Option<&BookRecord>, chapters: &[ChapterRecord]) -> Phase {
        derive_phase_with(book, chapters, self.options.max_cover_attempts)
    }

    /// 显式模型优先，否则按速度预设
    pub fn resolve_model(&self, settings: &BookSettings) -> String {
        match settings.model_id.as_deref().map(str::trim) {
            Some(model) if !model.is_empty() => model.to_string(),
            _ => self.options.models.for_speed(settings.generation_speed).to_string(),
        }
    }

    /// 加载持久化状态；他人的书籍视为不存在
    pub async fn load(&self, user_id: &str, book_id: Option<Uuid>) -> Result<RunState, ApplicationError> {
        let Some(book_id) = book_id else {
            return Ok(RunState {
                book: None,
                chapters: Vec::new(),
            });
        };

        let book = self
            .repo
            .get_book(book_id)
            .await?
            .filter(|b| b.user_id == user_id)
            .ok_or_else(|| ApplicationError::not_found("Book", book_id))?;
        let chapters = self.repo.get_book_chapters(book_id).await?;

        Ok(RunState {
            book: Some(book),
            chapters,
        })
    }

    /// 创建书籍（Creating 阶段）
    pub async fn create_book(&self, cmd: &GenerateBookCommand) -> Result<BookRecord, ApplicationError> {
        cmd.outline.validate()?;

        let mut book = BookRecord::new(cmd.user_id.clone(), cmd.outline.clone(), cmd.settings.clone());
        book.metadata.model_used = Some(self.resolve_model(&cmd.settings));
        self.repo.create_book(&book).await?;

        tracing::info!(
            book_id = %book.id,
            title = %book.outline.title,
            total_chapters = book.total_chapters(),
            "Book created"
        );
        Ok(book)
    }

    /// 执行一个批次并持久化
    pub async fn generate_batch(
        &self,
        book: &BookRecord,
        chapters: &[ChapterRecord],
        numbers: &[u32],
        observer: Option<&dyn BatchObserver>,
    ) -> Result<BatchStep, ApplicationError> {
        let model_id = self.resolve_model(&book.settings);
        let bibliography = book
            .settings
            .bibliography
            .enabled
            .then_some(&book.settings.bibliography);

        tracing::info!(
            book_id = %book.id,
            batch = ?numbers,
            parallel = book.settings.use_parallel,
            model = %model_id,
            "Starting batch"
        );

        let outcome = self
            .scheduler
            .run_batch(
                BatchRequest {
                    outline: &book.outline,
                    chapter_numbers: numbers,
                    persisted: chapters,
                    model_id: &model_id,
                    bibliography,
                    parallel: book.settings.use_parallel,
                },
                observer,
            )
            .await;

        let records: Vec<ChapterRecord> = outcome
            .chapters
            .iter()
            .map(|c| ChapterRecord::new(book.id, c.number, c.title.clone(), c.content.clone(), c.word_count))
            .collect();
        if !records.is_empty() {
            self.repo.create_multiple_chapters(&records).await?;
        }

        let chapters = self.repo.get_book_chapters(book.id).await?;
        let metadata = aggregate_metadata(&book.metadata, &chapters, &model_id);
        let book = self
            .repo
            .update_book(
                book.id,
                &BookPatch {
                    metadata: Some(metadata),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(
            book_id = %book.id,
            persisted = records.len(),
            failed = ?outcome.failed_numbers(),
            mode = ?outcome.mode,
            chapters_completed = completed_count(&book, &chapters),
            "Batch finished"
        );

        Ok(BatchStep {
            outcome,
            book,
            chapters,
        })
    }

    /// 生成封面与封底（各自尽力而为）
    pub async fn generate_covers(&self, book: &BookRecord) -> Result<(CoverOutcome, BookRecord), ApplicationError> {
        let request = CoverRequest {
            title: book.outline.title.clone(),
            author: book.outline.author.clone(),
            genre: book.outline.genre.clone(),
            description: book.outline.description.clone(),
            style_hint: format!(
                "{} style for {}",
                book.settings.writing_style, book.settings.target_audience
            ),
        };

        let front = match &book.cover_url {
            Some(url) => CoverAttempt::AlreadyPresent(url.clone()),
            None => match self.images.generate_cover_image(&request).await {
                Ok(url) => CoverAttempt::Generated(url),
                Err(e) => {
                    let failure = classify(&e.to_string());
                    tracing::warn!(book_id = %book.id, error = %e, "Front cover generation failed");
                    CoverAttempt::Failed(failure)
                }
            },
        };

        let back = match &book.metadata.back_cover_url {
            Some(url) => CoverAttempt::AlreadyPresent(url.clone()),
            None => match self
                .images
                .generate_back_cover_image(
                    &request,
                    self.options.back_cover_model.as_deref(),
                    Some(&self.options.branding),
                )
                .await
            {
                Ok(url) => CoverAttempt::Generated(url),
                Err(e) => {
                    let failure = classify(&e.to_string());
                    tracing::warn!(book_id = %book.id, error = %e, "Back cover generation failed");
                    CoverAttempt::Failed(failure)
                }
            },
        };

        let mut metadata = book.metadata.clone();
        let mut patch = BookPatch::default();
        if let CoverAttempt::Generated(url) = &front {
            patch.cover_url = Some(url.clone());
        }
        if let CoverAttempt::Failed(_) = &front {
            metadata.cover_attempts += 1;
        }
        if let CoverAttempt::Generated(url) = &back {
            metadata.back_cover_url = Some(url.clone());
        }
        patch.metadata = Some(metadata);

        let book = self.repo.update_book(book.id, &patch).await?;
        tracing::info!(
            book_id = %book.id,
            has_cover = book.cover_url.is_some(),
            has_back_cover = book.metadata.back_cover_url.is_some(),
            "Cover phase finished"
        );

        Ok((CoverOutcome { front, back }, book))
    }

    /// 收尾：参考文献 + 状态置为 completed；重复调用不做任何写入
    pub async fn finalize(&self, book: &BookRecord, chapters: &[ChapterRecord]) -> Result<BookRecord, ApplicationError> {
        if book.status == BookStatus::Completed {
            return Ok(book.clone());
        }

        let model_id = self.resolve_model(&book.settings);
        let mut metadata = aggregate_metadata(&book.metadata, chapters, &model_id);

        let bib = &book.settings.bibliography;
        if bib.enabled && metadata.bibliography.is_none() {
            let titles: Vec<String> = chapters.iter().map(|c| c.title.clone()).collect();
            match self
                .bibliography
                .generate_references(&book.outline, &titles, bib.citation_style)
                .await
            {
                Ok(references) => {
                    metadata.bibliography = Some(BibliographySummary {
                        citation_style: bib.citation_style,
                        references,
                    });
                }
                Err(e) => {
                    tracing::warn!(book_id = %book.id, error = %e, "Bibliography generation failed");
                }
            }
        }

        let book = self
            .repo
            .update_book(
                book.id,
                &BookPatch {
                    status: Some(BookStatus::Completed),
                    metadata: Some(metadata),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(
            book_id = %book.id,
            word_count = book.metadata.word_count,
            chapters = book.metadata.chapter_count,
            "Book finalized"
        );
        Ok(book)
    }

    /// 增量模式：推进恰好一个工作单元
    pub async fn advance(&self, cmd: &GenerateBookCommand) -> Result<StepReport, ApplicationError> {
        self.ensure_ready()?;

        let state = self.load(&cmd.user_id, cmd.book_id).await?;
        let phase = self.phase_of(state.book.as_ref(), &state.chapters);

        let book = match state.book {
            None => {
                let book = self.create_book(cmd).await?;
                let snapshot = ProgressSnapshot::new(Phase::Creating, 0, book.total_chapters());
                return Ok(StepReport {
                    phase: Phase::Creating,
                    book,
                    snapshot,
                    detail: StepDetail::Created,
                });
            }
            Some(book) => book,
        };
        let total = book.total_chapters();

        match phase {
            Phase::Creating => Err(ApplicationError::internal("existing book derived as creating")),
            Phase::Generating => {
                let missing = missing_chapters(&book, &state.chapters);
                let batch = self.scheduler.next_batch(&missing);
                let step = self.generate_batch(&book, &state.chapters, &batch, None).await?;
                let done = completed_count(&step.book, &step.chapters);
                Ok(StepReport {
                    phase: Phase::Generating,
                    snapshot: ProgressSnapshot::new(Phase::Generating, done, total),
                    book: step.book,
                    detail: StepDetail::Batch(step.outcome),
                })
            }
            Phase::Cover => {
                let (outcome, book) = self.generate_covers(&book).await?;
                let done = completed_count(&book, &state.chapters);
                Ok(StepReport {
                    phase: Phase::Cover,
                    snapshot: ProgressSnapshot::new(Phase::Cover, done, total),
                    book,
                    detail: StepDetail::Covers(outcome),
                })
            }
            Phase::Completed => {
                let already_completed = book.status == BookStatus::Completed;
                let book = self.finalize(&book, &state.chapters).await?;
                let done = completed_count(&book, &state.chapters);
                Ok(StepReport {
                    phase: Phase::Completed,
                    snapshot: ProgressSnapshot::new(Phase::Completed, done, total),
                    book,
                    detail: StepDetail::Finalized { already_completed },
                })
            }
        }
    }
}

/// 从完整章节集合重新计算聚合元数据
fn aggregate_metadata(base: &BookMetadata, chapters: &[ChapterRecord], model_id: &str) -> BookMetadata {
    BookMetadata {
        word_count: chapters.iter().map(|c| u64::from(c.word_count)).sum(),
        chapter_count: chapters.len() as u32,
        model_used: Some(model_id.to_string()),
        ..base.clone()
    }
}
