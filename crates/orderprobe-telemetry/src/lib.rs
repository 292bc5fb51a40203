//! Prometheus metrics and structured logging for orderprobe.
//!
//! - Structured logging with tracing (pretty in development, JSON in production)
//! - Prometheus counters and histograms for probe outcomes and latency
//! - Periodic probe statistics summary (counts and P50/P95/P99 latency)

pub mod error;
pub mod logging;
pub mod metrics;
pub mod probe_stats;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use probe_stats::{ProbeStats, ProbeStatsReporter};
