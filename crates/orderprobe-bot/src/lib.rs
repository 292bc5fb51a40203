//! orderprobe: synthetic order-latency probe service.
//!
//! Wires the pieces together:
//! - configuration loading and validation
//! - venue session (login/logout)
//! - the scheduler gating probes to trading hours
//! - latency reporting and periodic statistics

pub mod app;
pub mod config;
pub mod error;
pub mod scheduler;

pub use app::Application;
pub use config::{AppConfig, OperatingMode};
pub use error::{AppError, AppResult};
pub use scheduler::{Clock, Scheduler, SchedulerConfig, SchedulerSummary, StopReason, SystemClock};
