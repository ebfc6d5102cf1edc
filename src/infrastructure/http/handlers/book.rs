//! Book Status Handler

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::stream::user_id_from;
use crate::application::GetBookProgress;
use crate::infrastructure::http::dto::{BookStatusParams, BookStatusResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// GET /generate/book/:book_id
pub async fn get_book_status(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Query(params): Query<BookStatusParams>,
    headers: HeaderMap,
) -> Result<Json<BookStatusResponse>, ApiError> {
    let user_id = user_id_from(&headers)
        .or(params.user_id)
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("userId is required".to_string()))?;

    let view = state
        .book_progress_handler
        .handle(GetBookProgress { user_id, book_id })
        .await?;

    Ok(Json(BookStatusResponse::from(view)))
}
