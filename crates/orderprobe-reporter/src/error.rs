//! Report delivery error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Collector answered with a non-success status.
    #[error("Collector returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;
