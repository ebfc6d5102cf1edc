//! Ping Handler
//!
//! 健康检查，同时报告文本提供方是否已配置

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::infrastructure::http::state::AppState;

/// Ping 响应
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// 提供方凭据缺失时为 false，此时生成请求会直接失败
    pub provider_ready: bool,
}

/// Ping endpoint - 健康检查
pub async fn ping(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    Json(PingResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider_ready: state.orchestrator.ensure_ready().is_ok(),
    })
}
