//! HTTP Routes
//!
//! API Endpoints:
//! - /ping                      GET   健康检查
//! - /generate/book             POST  增量生成（每次推进一步）
//! - /generate/book-stream      POST  流式生成（SSE，一次跑完）
//! - /generate/book/:book_id    GET   查询书籍进度（只读）

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/generate", generate_routes())
}

/// Generate 路由
fn generate_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/book", post(handlers::generate_book))
        .route("/book-stream", post(handlers::generate_book_stream))
        .route("/book/:book_id", get(handlers::get_book_status))
}
