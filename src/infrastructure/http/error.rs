//! HTTP Error Handling
//!
//! 失败体固定为 `{success:false, error, details, progressPreserved:true}`；
//! 章节只追加写入，任何失败后重新调用都是安全的

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;
use crate::domain::{classify, FailureKind};

/// 统一错误响应格式
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub kind: FailureKind,
    pub error: String,
    pub details: String,
    pub progress_preserved: bool,
}

impl ErrorResponse {
    pub fn new(kind: FailureKind, error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            kind,
            error: error.into(),
            details: details.into(),
            progress_preserved: true,
        }
    }
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, response) = match &self {
            ApiError::NotFound(msg) => {
                tracing::warn!(error = %msg, "Resource not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new(FailureKind::Unknown, "Book not found", msg.clone()),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(error = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new(FailureKind::Unknown, "Invalid request", msg.clone()),
                )
            }
            ApiError::Internal(msg) => {
                let failure = classify(msg);
                tracing::error!(error = %msg, kind = failure.kind.as_str(), "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new(failure.kind, failure.user_message, failure.user_details),
                )
            }
        };

        (status, Json(response)).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        match e {
            ApplicationError::NotFound { resource_type, id } => {
                ApiError::NotFound(format!("{} not found: {}", resource_type, id))
            }
            ApplicationError::ValidationError(msg) => ApiError::BadRequest(msg),
            ApplicationError::RepositoryError(msg) => ApiError::Internal(msg),
            ApplicationError::ProviderError(msg) => ApiError::Internal(msg),
            ApplicationError::Fatal(msg) => ApiError::Internal(msg),
            ApplicationError::InternalError(msg) => ApiError::Internal(msg),
        }
    }
}
