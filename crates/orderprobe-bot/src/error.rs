//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value: {0}")]
    Core(#[from] orderprobe_core::CoreError),

    #[error("Venue error: {0}")]
    Gateway(#[from] orderprobe_gateway::GatewayError),

    #[error("Reporter error: {0}")]
    Report(#[from] orderprobe_reporter::ReportError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] orderprobe_telemetry::TelemetryError),

    /// The scheduler stopped because a probe order executed.
    #[error("Halted: {0}")]
    Halted(orderprobe_engine::ProbeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
