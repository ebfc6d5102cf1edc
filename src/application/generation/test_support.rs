//! 测试用可编排提供方：记录每次调用（章节号、上下文、批次）

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;

use crate::application::ports::{
    BatchChapter, BibliographyPort, BrandingOptions, ChapterRequest, ChapterSink, CoverImagePort, CoverRequest,
    GeneratedText, GenerationError, Reference, TextGeneratorPort,
};
use crate::domain::{BibliographySettings, CitationStyle, Outline};

#[derive(Debug, Clone)]
pub(crate) struct ChapterCall {
    pub number: u32,
    pub context: String,
}

pub(crate) struct ScriptedProvider {
    calls: Mutex<Vec<ChapterCall>>,
    batches: Mutex<Vec<Vec<u32>>>,
    fail_always: Mutex<HashSet<u32>>,
    fail_once: Mutex<HashSet<u32>>,
    empty: Mutex<HashSet<u32>>,
    delays: Mutex<HashMap<u32, Duration>>,
    /// 按发生顺序记录的事件（章节返回、测试观察者回调）
    timeline: Mutex<Vec<String>>,
    fail_message: Mutex<String>,
    not_configured: AtomicBool,
    cover_fails: AtomicBool,
    back_cover_fails: AtomicBool,
    pub cover_calls: AtomicUsize,
    pub back_cover_calls: AtomicUsize,
    pub bibliography_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            fail_always: Mutex::new(HashSet::new()),
            fail_once: Mutex::new(HashSet::new()),
            empty: Mutex::new(HashSet::new()),
            delays: Mutex::new(HashMap::new()),
            timeline: Mutex::new(Vec::new()),
            fail_message: Mutex::new("HTTP 500: upstream exploded".to_string()),
            not_configured: AtomicBool::new(false),
            cover_fails: AtomicBool::new(false),
            back_cover_fails: AtomicBool::new(false),
            cover_calls: AtomicUsize::new(0),
            back_cover_calls: AtomicUsize::new(0),
            bibliography_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_chapter_always(&self, number: u32) {
        self.fail_always.lock().unwrap().insert(number);
    }

    pub fn fail_chapter_once(&self, number: u32) {
        self.fail_once.lock().unwrap().insert(number);
    }

    pub fn clear_failures(&self) {
        self.fail_always.lock().unwrap().clear();
        self.fail_once.lock().unwrap().clear();
    }

    pub fn return_empty_for(&self, number: u32) {
        self.empty.lock().unwrap().insert(number);
    }

    pub fn delay_chapter(&self, number: u32, delay: Duration) {
        self.delays.lock().unwrap().insert(number, delay);
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.timeline.lock().unwrap().push(entry.into());
    }

    pub fn timeline(&self) -> Vec<String> {
        self.timeline.lock().unwrap().clone()
    }

    pub fn set_fail_message(&self, message: &str) {
        *self.fail_message.lock().unwrap() = message.to_string();
    }

    pub fn set_not_configured(&self) {
        self.not_configured.store(true, Ordering::SeqCst);
    }

    pub fn fail_covers(&self, fail: bool) {
        self.cover_fails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_back_cover(&self, fail: bool) {
        self.back_cover_fails.store(fail, Ordering::SeqCst);
    }

    pub fn chapter_calls(&self) -> Vec<ChapterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requested_numbers(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|c| c.number).collect()
    }

    pub fn batch_calls(&self) -> Vec<Vec<u32>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.batches.lock().unwrap().clear();
    }
}

#[async_trait]
impl TextGeneratorPort for ScriptedProvider {
    fn ensure_ready(&self) -> Result<(), GenerationError> {
        if self.not_configured.load(Ordering::SeqCst) {
            return Err(GenerationError::NotConfigured("API key is missing".to_string()));
        }
        Ok(())
    }

    async fn generate_chapter(&self, request: ChapterRequest<'_>) -> Result<GeneratedText, GenerationError> {
        let number = request.chapter_number;
        self.calls.lock().unwrap().push(ChapterCall {
            number,
            context: request.preceding_context.to_string(),
        });
        let delay = self.delays.lock().unwrap().get(&number).copied();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let fails = self.fail_always.lock().unwrap().contains(&number)
            || self.fail_once.lock().unwrap().remove(&number);
        if fails {
            return Err(GenerationError::InvalidResponse(
                self.fail_message.lock().unwrap().clone(),
            ));
        }

        if self.empty.lock().unwrap().contains(&number) {
            return Ok(GeneratedText {
                title: String::new(),
                content: "```\n```".to_string(),
            });
        }

        self.record(format!("provider_done_{}", number));
        let stub_title = request
            .outline
            .chapter(number)
            .map(|c| c.title.clone())
            .unwrap_or_default();
        Ok(GeneratedText {
            title: stub_title,
            content: format!("## Chapter {}\n\nThe story of chapter {} unfolds here.", number, number),
        })
    }

    async fn generate_chapter_batch(
        &self,
        outline: &Outline,
        chapter_numbers: &[u32],
        preceding_context: &str,
        model_id: &str,
        bibliography: Option<&BibliographySettings>,
        on_chapter_done: Option<&dyn ChapterSink>,
    ) -> Result<Vec<BatchChapter>, GenerationError> {
        self.batches.lock().unwrap().push(chapter_numbers.to_vec());
        let calls = chapter_numbers.iter().map(|&chapter_number| async move {
            let text = self
                .generate_chapter(ChapterRequest {
                    outline,
                    chapter_number,
                    preceding_context,
                    model_id,
                    bibliography,
                })
                .await?;
            let chapter = BatchChapter {
                chapter_number,
                title: text.title,
                content: text.content,
            };
            if let Some(sink) = on_chapter_done {
                sink.chapter_done(&chapter);
            }
            Ok::<_, GenerationError>(chapter)
        });
        join_all(calls).await.into_iter().collect()
    }
}

#[async_trait]
impl CoverImagePort for ScriptedProvider {
    async fn generate_cover_image(&self, request: &CoverRequest) -> Result<String, GenerationError> {
        self.cover_calls.fetch_add(1, Ordering::SeqCst);
        if self.cover_fails.load(Ordering::SeqCst) {
            return Err(GenerationError::Service {
                status: 429,
                body: "Too Many Requests".to_string(),
            });
        }
        Ok(format!("https://img.test/{}/front.png", request.title.len()))
    }

    async fn generate_back_cover_image(
        &self,
        request: &CoverRequest,
        _model_override: Option<&str>,
        _branding: Option<&BrandingOptions>,
    ) -> Result<String, GenerationError> {
        self.back_cover_calls.fetch_add(1, Ordering::SeqCst);
        if self.back_cover_fails.load(Ordering::SeqCst) {
            return Err(GenerationError::Timeout);
        }
        Ok(format!("https://img.test/{}/back.png", request.title.len()))
    }
}

#[async_trait]
impl BibliographyPort for ScriptedProvider {
    async fn generate_references(
        &self,
        outline: &Outline,
        _chapter_titles: &[String],
        style: CitationStyle,
    ) -> Result<Vec<Reference>, GenerationError> {
        self.bibliography_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Reference {
            citation: format!("{} ({}). {}.", outline.author, style.as_str(), outline.title),
        }])
    }
}
