//! 进度计算
//!
//! 阶段权重: 创建 5%，章节生成占 90%（按完成比例缩放），封面 95%，完成 100%

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

use super::phase::Phase;

const CREATED_PERCENT: u32 = 5;
const CHAPTERS_WEIGHT: u32 = 90;
const COVER_PERCENT: u8 = 95;
const COMPLETED_PERCENT: u8 = 100;

/// 进度
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub percent: u8,
    pub message: String,
}

/// 可上报的进度快照，只生成不存储
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub phase: Phase,
    pub chapters_completed: usize,
    pub total_chapters: usize,
    pub percent: u8,
    pub message: String,
}

impl ProgressSnapshot {
    pub fn new(phase: Phase, chapters_completed: usize, total_chapters: usize) -> Self {
        let progress = compute_progress(phase, chapters_completed, total_chapters);
        Self {
            phase,
            chapters_completed,
            total_chapters,
            percent: progress.percent,
            message: progress.message,
        }
    }
}

fn chapters_percent(chapters_completed: usize, total_chapters: usize) -> u8 {
    if total_chapters == 0 {
        return CREATED_PERCENT as u8;
    }
    let done = chapters_completed.min(total_chapters) as u32;
    (CREATED_PERCENT + CHAPTERS_WEIGHT * done / total_chapters as u32) as u8
}

/// 计算进度
pub fn compute_progress(phase: Phase, chapters_completed: usize, total_chapters: usize) -> Progress {
    match phase {
        Phase::Creating => Progress {
            percent: CREATED_PERCENT as u8,
            message: format!("Book created, preparing {} chapters", total_chapters),
        },
        Phase::Generating => Progress {
            percent: chapters_percent(chapters_completed, total_chapters),
            message: format!(
                "Generated {} of {} chapters",
                chapters_completed.min(total_chapters),
                total_chapters
            ),
        },
        Phase::Cover => Progress {
            percent: COVER_PERCENT,
            message: "Generating cover art".to_string(),
        },
        Phase::Completed => Progress {
            percent: COMPLETED_PERCENT,
            message: "Book generation complete".to_string(),
        },
    }
}

/// 单次运行内的进度单调器
///
/// 上报值取历史最大值，保证连续快照不回退
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: AtomicU8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录并返回单调化后的百分比
    pub fn observe(&self, percent: u8) -> u8 {
        let percent = percent.min(COMPLETED_PERCENT);
        let previous = self.last.fetch_max(percent, Ordering::SeqCst);
        previous.max(percent)
    }

    pub fn current(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }
}
