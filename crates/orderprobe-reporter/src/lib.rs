//! Latency report delivery for orderprobe.
//!
//! The probe engine hands every measured [`LatencyRecord`] to a
//! [`LatencySink`]. Sinks never block the caller and never report
//! failures back; delivery problems are logged and counted.
//!
//! [`LatencyRecord`]: orderprobe_core::LatencyRecord

pub mod error;
pub mod http;
pub mod payload;
pub mod sink;

pub use error::{ReportError, ReportResult};
pub use http::HttpReporter;
pub use payload::LatencyReport;
pub use sink::{BoxFuture, DynLatencySink, LatencySink, LogSink, RecordingSink};
