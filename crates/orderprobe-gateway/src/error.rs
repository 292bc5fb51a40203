//! Gateway error types.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Login failed: {0}")]
    Login(String),

    #[error("Order submission failed: {0}")]
    Submit(String),

    #[error("Cancel failed: {0}")]
    Cancel(String),

    #[error("Status query failed: {0}")]
    Status(String),

    #[error("Not connected")]
    Disconnected,
}

pub type GatewayResult<T> = Result<T, GatewayError>;
