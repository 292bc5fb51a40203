//! HTTP collector client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use orderprobe_core::LatencyRecord;
use orderprobe_telemetry::Metrics;

use crate::error::{ReportError, ReportResult};
use crate::payload::LatencyReport;
use crate::sink::{BoxFuture, LatencySink};

struct Collector {
    client: Client,
    url: String,
}

impl Collector {
    async fn post(&self, report: &LatencyReport) -> ReportResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(report)
            .send()
            .await
            .map_err(|e| ReportError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Posts each record to the collector on a background task.
///
/// One attempt per record, bounded by the client timeout. No retries.
pub struct HttpReporter {
    collector: Arc<Collector>,
    tracker: TaskTracker,
}

impl std::fmt::Debug for HttpReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReporter")
            .field("url", &self.collector.url)
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

impl HttpReporter {
    /// Create a reporter for `url` with the given per-request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> ReportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            collector: Arc::new(Collector {
                client,
                url: url.into(),
            }),
            tracker: TaskTracker::new(),
        })
    }

    /// Deliveries currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Deliver one record and wait for the answer.
    pub async fn deliver(&self, record: &LatencyRecord) -> ReportResult<()> {
        self.collector.post(&LatencyReport::from(record)).await
    }
}

impl LatencySink for HttpReporter {
    fn submit(&self, record: LatencyRecord) {
        let collector = Arc::clone(&self.collector);
        self.tracker.spawn(async move {
            let report = LatencyReport::from(&record);
            match collector.post(&report).await {
                Ok(()) => {
                    info!(
                        broker = %report.broker,
                        symbol = %report.symbol,
                        latency_ms = report.latency_ms,
                        "Latency reported"
                    );
                    Metrics::report_delivered(true);
                }
                Err(e) => {
                    warn!(error = %e, latency_ms = report.latency_ms, "Latency report failed");
                    Metrics::report_delivered(false);
                }
            }
        });
    }

    fn drain(&self, grace: Duration) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            self.tracker.close();
            let pending = self.tracker.len();
            if pending > 0 {
                debug!(pending, "Waiting for in-flight reports");
            }
            let drained = tokio::time::timeout(grace, self.tracker.wait()).await.is_ok();
            if !drained {
                warn!(pending = self.tracker.len(), "Abandoning in-flight reports");
            }
            drained
        })
    }
}
