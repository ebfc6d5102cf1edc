//! Incremental Generation Handler
//!
//! 每次调用推进一个工作单元，调用方轮询直到 phase == completed

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::application::GenerateBookCommand;
use crate::infrastructure::http::dto::{GenerateBookRequest, GenerateBookResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 请求体转为命令
///
/// `user_id` 由调用方给定时优先于请求体；`require_config` 控制 config 是否必填
pub(super) fn into_command(
    request: GenerateBookRequest,
    user_id: Option<String>,
    require_config: bool,
) -> Result<GenerateBookCommand, ApiError> {
    let user_id = user_id
        .or_else(|| request.user_id.clone())
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;

    let outline = request
        .outline
        .clone()
        .ok_or_else(|| ApiError::BadRequest("outline is required".to_string()))?;

    let base = match request.config.clone() {
        Some(config) => config,
        None if require_config => return Err(ApiError::BadRequest("config is required".to_string())),
        None => Default::default(),
    };

    if let Some(start) = request.start_chapter {
        tracing::debug!(start_chapter = start, "startChapter ignored, resuming from persisted state");
    }

    Ok(GenerateBookCommand {
        user_id,
        settings: request.merged_settings(base),
        outline,
        book_id: request.book_id,
    })
}

/// POST /generate/book
pub async fn generate_book(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateBookRequest>, JsonRejection>,
) -> Result<Json<GenerateBookResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let command = into_command(request, None, true)?;

    let step = state.advance_handler.handle(command).await?;
    Ok(Json(GenerateBookResponse::from(step)))
}
