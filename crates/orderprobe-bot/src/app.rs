//! Main application orchestration.
//!
//! Owns the venue session, the latency sink and the scheduler:
//! login, probe until shutdown, then logout, drain pending reports and
//! print final statistics.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use orderprobe_engine::{ProbeEngine, ProbeError, ProbeOutcome};
use orderprobe_gateway::{DynGateway, PaperVenue};
use orderprobe_reporter::{DynLatencySink, HttpReporter, LogSink};
use orderprobe_telemetry::ProbeStatsReporter;

use crate::config::{AppConfig, OperatingMode};
use crate::error::{AppError, AppResult};
use crate::scheduler::{Scheduler, SchedulerSummary, SystemClock};

/// Grace period for in-flight reports at shutdown.
const REPORT_DRAIN_GRACE: Duration = Duration::from_secs(6);

/// Main application.
pub struct Application {
    config: AppConfig,
    gateway: DynGateway,
    sink: DynLatencySink,
    max_probes: Option<u64>,
}

impl Application {
    /// Create the application for the configured mode.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let gateway: DynGateway = match config.mode {
            OperatingMode::Paper => Arc::new(PaperVenue::new(config.paper.clone())),
            OperatingMode::Live => {
                return Err(AppError::Config(
                    "live mode needs a venue adapter and none is linked into this build".to_string(),
                ))
            }
        };

        let sink: DynLatencySink = if config.report.enabled {
            Arc::new(HttpReporter::new(
                config.report.url.clone(),
                Duration::from_millis(config.report.timeout_ms),
            )?)
        } else {
            warn!("Remote reporting disabled; latencies are only logged");
            Arc::new(LogSink)
        };

        Ok(Self::with_parts(config, gateway, sink))
    }

    /// Create the application around an existing gateway and sink.
    pub fn with_parts(config: AppConfig, gateway: DynGateway, sink: DynLatencySink) -> Self {
        Self {
            config,
            gateway,
            sink,
            max_probes: None,
        }
    }

    /// Stop after `max` probes.
    #[must_use]
    pub fn with_max_probes(mut self, max: Option<u64>) -> Self {
        self.max_probes = max;
        self
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<SchedulerSummary> {
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                signal.cancel();
            }
        });
        self.run_until(shutdown).await
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// A login failure is returned before any probe is placed. A halting
    /// fill is returned as [`AppError::Halted`] after cleanup.
    pub async fn run_until(self, shutdown: CancellationToken) -> AppResult<SchedulerSummary> {
        let request = self.config.order_request()?;
        let window = self.config.trading_window()?;
        let mut scheduler_config = self.config.scheduler_config();
        scheduler_config.max_probes = self.max_probes;

        info!(venue = self.gateway.name(), mode = ?self.config.mode, "Logging in to venue");
        self.gateway.login().await?;

        let engine = ProbeEngine::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.sink),
            self.config.probe_config(),
        );
        let stats = Arc::new(ProbeStatsReporter::new(vec![request.symbol.clone()]));
        let stats_stop = shutdown.child_token();
        let stats_task = self.spawn_stats(Arc::clone(&stats), stats_stop.clone());

        let mut scheduler = Scheduler::new(engine, request, window, scheduler_config, SystemClock);
        let summary = scheduler.run(shutdown).await;

        info!("Shutting down");
        stats_stop.cancel();
        if let Some(task) = stats_task {
            let _ = task.await;
        }
        if let Err(e) = self.gateway.logout().await {
            warn!(error = %e, "Logout failed");
        }
        if !self.sink.drain(REPORT_DRAIN_GRACE).await {
            warn!("Some latency reports were not delivered before shutdown");
        }

        info!("Final statistics summary:");
        stats.output_summary();

        if let Some(ProbeOutcome::Filled {
            order_id, source, ..
        }) = summary.halted_by.clone()
        {
            return Err(AppError::Halted(ProbeError::FillEscape {
                order_id,
                fill_source: source,
            }));
        }
        Ok(summary)
    }

    fn spawn_stats(
        &self,
        stats: Arc<ProbeStatsReporter>,
        stop: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let secs = self.config.telemetry.stats_interval_secs;
        if secs == 0 {
            return None;
        }

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        info!("Outputting periodic statistics summary");
                        stats.output_summary();
                    }
                }
            }
        }))
    }
}
