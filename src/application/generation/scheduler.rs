//! 批次调度
//!
//! 把缺失的章节编号切分为固定大小的批次，并以
//! “并行 + 顺序回退”或纯顺序方式执行单个批次。
//!
//! - 并行：批内章节使用批次开始前计算的上下文快照（兄弟章节互不可见），
//!   每章返回即通知观察者，全部结束后汇合；任一失败则丢弃整批结果，
//!   对同一组章节回退到顺序模式（仅一次）。回退后顺序阶段会再次通知成功章节
//! - 批次范围内夹有已持久化章节时（补缺口），按这些章节切成若干段，
//!   每段的快照只包含编号小于段首的已持久化章节，各段并发执行
//! - 顺序：按编号升序逐章生成，每章成功后重建上下文；
//!   单章失败只记录并跳过，留下可在下次续跑时检测到的缺口

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;

use crate::application::ports::{
    BatchChapter, ChapterRecord, ChapterRequest, ChapterSink, GenerationError, TextGeneratorPort,
};
use crate::domain::{classify, count_words, sanitize, BibliographySettings, ClassifiedFailure, ContextChapter, Outline};

/// 批次内成功生成的章节（已清洗）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterResult {
    pub number: u32,
    pub title: String,
    pub content: String,
    pub word_count: u32,
}

/// 单章失败
#[derive(Debug, Clone)]
pub struct ChapterFailure {
    pub number: u32,
    pub error: String,
    pub failure: ClassifiedFailure,
}

/// 批次实际执行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Parallel,
    Sequential,
    /// 并行失败后回退为顺序
    Fallback,
}

/// 批次结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub chapters: Vec<ChapterResult>,
    pub failures: Vec<ChapterFailure>,
    pub mode: ExecutionMode,
}

impl BatchOutcome {
    pub fn failed_numbers(&self) -> Vec<u32> {
        self.failures.iter().map(|f| f.number).collect()
    }
}

/// 批次请求
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub outline: &'a Outline,
    pub chapter_numbers: &'a [u32],
    /// 批次开始前已持久化的章节
    pub persisted: &'a [ChapterRecord],
    pub model_id: &'a str,
    pub bibliography: Option<&'a BibliographySettings>,
    pub parallel: bool,
}

/// 批次执行观察者，回调在每个事件发生时同步调用
pub trait BatchObserver: Send + Sync {
    /// 单章成功；`done_in_batch` 为本批已成功章节数（含本章）
    fn on_chapter_done(&self, _chapter: &ChapterResult, _done_in_batch: usize) {}

    /// 单章失败（顺序模式）
    fn on_chapter_error(&self, _failure: &ChapterFailure) {}

    /// 并行批次失败，即将回退为顺序
    fn on_parallel_failed(&self, _failure: &ClassifiedFailure) {}
}

/// 并行批次中把端口回调转给观察者
struct ParallelProgress<'a> {
    outline: &'a Outline,
    observer: &'a dyn BatchObserver,
    done: AtomicUsize,
}

impl ChapterSink for ParallelProgress<'_> {
    fn chapter_done(&self, chapter: &BatchChapter) {
        // 清洗失败的章节会在汇合时让整批失败，这里不通知
        if let Ok(result) = finish_chapter(self.outline, chapter) {
            let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
            self.observer.on_chapter_done(&result, done);
        }
    }
}

/// 批次调度器
pub struct BatchScheduler {
    text: Arc<dyn TextGeneratorPort>,
    batch_size: usize,
}

impl BatchScheduler {
    pub fn new(text: Arc<dyn TextGeneratorPort>, batch_size: usize) -> Self {
        Self {
            text,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 按固定大小切分（保持升序）
    pub fn plan_batches(&self, missing: &[u32]) -> Vec<Vec<u32>> {
        let mut ordered = missing.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        ordered.chunks(self.batch_size).map(<[u32]>::to_vec).collect()
    }

    /// 下一个批次
    pub fn next_batch(&self, missing: &[u32]) -> Vec<u32> {
        self.plan_batches(missing).into_iter().next().unwrap_or_default()
    }

    /// 执行单个批次
    pub async fn run_batch(
        &self,
        request: BatchRequest<'_>,
        observer: Option<&dyn BatchObserver>,
    ) -> BatchOutcome {
        let mut numbers = request.chapter_numbers.to_vec();
        numbers.sort_unstable();
        numbers.dedup();
        if numbers.len() > self.batch_size {
            tracing::warn!(
                requested = numbers.len(),
                batch_size = self.batch_size,
                "Batch larger than batch size, truncating"
            );
            numbers.truncate(self.batch_size);
        }

        if numbers.is_empty() {
            return BatchOutcome {
                chapters: Vec::new(),
                failures: Vec::new(),
                mode: ExecutionMode::Sequential,
            };
        }

        if !request.parallel {
            let (chapters, failures) = self.run_sequential(&request, &numbers, observer).await;
            return BatchOutcome {
                chapters,
                failures,
                mode: ExecutionMode::Sequential,
            };
        }

        match self.run_parallel(&request, &numbers, observer).await {
            Ok(chapters) => BatchOutcome {
                chapters,
                failures: Vec::new(),
                mode: ExecutionMode::Parallel,
            },
            Err(e) => {
                let failure = classify(&e.to_string());
                tracing::warn!(
                    chapters = ?numbers,
                    error = %e,
                    kind = failure.kind.as_str(),
                    "Parallel batch failed, falling back to sequential"
                );
                if let Some(observer) = observer {
                    observer.on_parallel_failed(&failure);
                }
                let (chapters, failures) = self.run_sequential(&request, &numbers, observer).await;
                BatchOutcome {
                    chapters,
                    failures,
                    mode: ExecutionMode::Fallback,
                }
            }
        }
    }

    /// 并行执行：批次前上下文快照，任一失败即整批失败
    async fn run_parallel(
        &self,
        request: &BatchRequest<'_>,
        numbers: &[u32],
        observer: Option<&dyn BatchObserver>,
    ) -> Result<Vec<ChapterResult>, GenerationError> {
        let segments = split_at_persisted(numbers, request.persisted);
        let contexts: Vec<String> = segments
            .iter()
            .map(|segment| self.context_before(request.persisted, &[], segment[0]))
            .collect();

        tracing::info!(
            chapters = ?numbers,
            segments = segments.len(),
            context_len = contexts.iter().map(String::len).max().unwrap_or(0),
            "Running parallel batch"
        );

        let progress = observer.map(|observer| ParallelProgress {
            outline: request.outline,
            observer,
            done: AtomicUsize::new(0),
        });
        let sink = progress.as_ref().map(|p| p as &dyn ChapterSink);

        let calls = segments.iter().zip(&contexts).map(|(segment, context)| {
            self.text.generate_chapter_batch(
                request.outline,
                segment,
                context,
                request.model_id,
                request.bibliography,
                sink,
            )
        });

        let mut generated = Vec::with_capacity(numbers.len());
        for result in join_all(calls).await {
            generated.extend(result?);
        }

        let mut results = Vec::with_capacity(numbers.len());
        for &number in numbers {
            let chapter = generated
                .iter()
                .find(|c| c.chapter_number == number)
                .ok_or_else(|| {
                    GenerationError::InvalidResponse(format!(
                        "batch response is missing chapter {}",
                        number
                    ))
                })?;
            results.push(finish_chapter(request.outline, chapter)?);
        }
        Ok(results)
    }

    /// 顺序执行：逐章生成并扩展上下文
    async fn run_sequential(
        &self,
        request: &BatchRequest<'_>,
        numbers: &[u32],
        observer: Option<&dyn BatchObserver>,
    ) -> (Vec<ChapterResult>, Vec<ChapterFailure>) {
        let mut produced: Vec<ChapterResult> = Vec::with_capacity(numbers.len());
        let mut failures = Vec::new();

        for &number in numbers {
            let context = self.context_before(request.persisted, &produced, number);
            let chapter_request = ChapterRequest {
                outline: request.outline,
                chapter_number: number,
                preceding_context: &context,
                model_id: request.model_id,
                bibliography: request.bibliography,
            };

            let outcome = match self.text.generate_chapter(chapter_request).await {
                Ok(text) => finish_chapter(
                    request.outline,
                    &BatchChapter {
                        chapter_number: number,
                        title: text.title,
                        content: text.content,
                    },
                ),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(chapter) => {
                    tracing::debug!(
                        chapter = number,
                        word_count = chapter.word_count,
                        "Chapter generated"
                    );
                    produced.push(chapter);
                    if let (Some(observer), Some(last)) = (observer, produced.last()) {
                        observer.on_chapter_done(last, produced.len());
                    }
                }
                Err(e) => {
                    let failure = ChapterFailure {
                        number,
                        error: e.to_string(),
                        failure: classify(&e.to_string()),
                    };
                    tracing::warn!(
                        chapter = number,
                        error = %e,
                        kind = failure.failure.kind.as_str(),
                        "Chapter generation failed, skipping"
                    );
                    if let Some(observer) = observer {
                        observer.on_chapter_error(&failure);
                    }
                    failures.push(failure);
                }
            }
        }

        (produced, failures)
    }

    /// 编号小于 `before` 的已知章节构成的上下文
    fn context_before(
        &self,
        persisted: &[ChapterRecord],
        produced: &[ChapterResult],
        before: u32,
    ) -> String {
        let entries: Vec<ContextChapter<'_>> = persisted
            .iter()
            .map(|c| ContextChapter {
                number: c.number,
                title: &c.title,
                content: &c.content,
            })
            .chain(produced.iter().map(|c| ContextChapter {
                number: c.number,
                title: &c.title,
                content: &c.content,
            }))
            .filter(|c| c.number < before)
            .collect();

        self.text.build_chapter_context(&entries)
    }
}

/// 按批次范围内已持久化的章节切段（输入已升序）
fn split_at_persisted(numbers: &[u32], persisted: &[ChapterRecord]) -> Vec<Vec<u32>> {
    let mut segments: Vec<Vec<u32>> = Vec::new();
    let mut prev: Option<u32> = None;
    for &number in numbers {
        let starts_segment = prev.map_or(true, |prev| {
            persisted.iter().any(|c| c.number > prev && c.number < number)
        });
        if starts_segment {
            segments.push(Vec::new());
        }
        if let Some(segment) = segments.last_mut() {
            segment.push(number);
        }
        prev = Some(number);
    }
    segments
}

/// 清洗生成结果；标题为空时回退到大纲标题
fn finish_chapter(outline: &Outline, chapter: &BatchChapter) -> Result<ChapterResult, GenerationError> {
    let content = sanitize(&chapter.content);
    if content.is_empty() {
        return Err(GenerationError::InvalidResponse(format!(
            "chapter {} came back empty",
            chapter.chapter_number
        )));
    }

    let title = match chapter.title.trim() {
        "" => outline
            .chapter(chapter.chapter_number)
            .map(|stub| stub.title.clone())
            .unwrap_or_else(|| format!("Chapter {}", chapter.chapter_number)),
        title => title.to_string(),
    };

    Ok(ChapterResult {
        number: chapter.chapter_number,
        title,
        word_count: count_words(&content),
        content,
    })
}
