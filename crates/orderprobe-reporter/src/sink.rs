//! Sink trait the probe engine reports through.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use orderprobe_core::LatencyRecord;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Receiver of latency records.
///
/// `submit` must return immediately. Delivery happens in the background
/// and its outcome never reaches the caller.
pub trait LatencySink: Send + Sync {
    /// Hand over a record for delivery.
    fn submit(&self, record: LatencyRecord);

    /// Wait up to `grace` for in-flight deliveries. Returns false if some
    /// were still pending when the grace period ran out.
    fn drain(&self, _grace: Duration) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }
}

/// Arc wrapper for LatencySink trait objects.
pub type DynLatencySink = Arc<dyn LatencySink>;

/// Sink that only logs. Used when remote reporting is disabled.
#[derive(Debug, Default)]
pub struct LogSink;

impl LatencySink for LogSink {
    fn submit(&self, record: LatencyRecord) {
        info!(
            broker = %record.broker,
            symbol = %record.symbol,
            latency_ms = record.latency_ms(),
            approximate = record.approximate,
            "Latency measured (reporting disabled)"
        );
    }
}

/// Sink that keeps every record in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LatencyRecord>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LatencyRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LatencySink for RecordingSink {
    fn submit(&self, record: LatencyRecord) {
        self.records.lock().push(record);
    }
}
