//! Streaming Generation Handler (SSE)
//!
//! 帧格式 `event: <name>\ndata: <json>\n\n`，固定间隔发送注释帧作为心跳。
//! 响应体被丢弃（客户端断开）时取消令牌随之触发。

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use tokio_stream::{wrappers::UnboundedReceiverStream, Stream, StreamExt};
use tokio_util::sync::DropGuard;

use super::generation::into_command;
use crate::application::{GenerationEvent, StreamHandle};
use crate::infrastructure::http::dto::GenerateBookRequest;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 会话身份头
pub const USER_ID_HEADER: &str = "x-user-id";

/// 流被丢弃时取消运行
struct CancelOnDrop<S> {
    inner: S,
    _guard: DropGuard,
}

impl<S: Stream + Unpin> Stream for CancelOnDrop<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

pub(super) fn user_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn to_sse_event(event: &GenerationEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            tracing::error!(event = event.name(), error = %e, "Failed to serialize event");
            Event::default().event("error").data(r#"{"error":"event serialization failed"}"#)
        })
}

/// POST /generate/book-stream
pub async fn generate_book_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<GenerateBookRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let command = into_command(request, user_id_from(&headers), false)?;

    tracing::info!(
        user_id = %command.user_id,
        book_id = ?command.book_id,
        chapters = command.outline.total_chapters(),
        "Streaming generation requested"
    );

    let StreamHandle { events, cancel } = state.stream_handler.handle(command);
    let stream = CancelOnDrop {
        inner: UnboundedReceiverStream::new(events).map(|event| Ok(to_sse_event(&event))),
        _guard: cancel.drop_guard(),
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.heartbeat).text("heartbeat")))
}
