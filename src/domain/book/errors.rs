//! Book Context - Errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("Invalid outline: {0}")]
    InvalidOutline(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
