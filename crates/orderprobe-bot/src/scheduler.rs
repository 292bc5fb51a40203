//! Probe scheduling.
//!
//! Runs one probe at a time while the trading window is open, pausing
//! `interval` between probes and rechecking every `idle_poll` while the
//! window is closed. Shutdown is observed between probes and during
//! sleeps; a probe in flight always runs to its terminal state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use orderprobe_core::{OrderRequest, TradingWindow};
use orderprobe_engine::{ProbeEngine, ProbeOutcome};
use orderprobe_telemetry::Metrics;

/// Wall-clock source for window checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub idle_poll: Duration,
    pub halt_on_fill_escape: bool,
    /// Stop after this many probes.
    pub max_probes: Option<u64>,
}

/// Why the scheduler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    MaxProbes,
    FillEscape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub probes: u64,
    pub cancelled: u64,
    pub filled: u64,
    pub failed: u64,
    pub stop_reason: StopReason,
    /// The outcome that halted the loop, if any.
    pub halted_by: Option<ProbeOutcome>,
}

/// Sequential probe loop.
pub struct Scheduler<C: Clock = SystemClock> {
    engine: ProbeEngine,
    request: OrderRequest,
    window: TradingWindow,
    config: SchedulerConfig,
    clock: C,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(
        engine: ProbeEngine,
        request: OrderRequest,
        window: TradingWindow,
        config: SchedulerConfig,
        clock: C,
    ) -> Self {
        Self {
            engine,
            request,
            window,
            config,
            clock,
        }
    }

    pub fn engine(&self) -> &ProbeEngine {
        &self.engine
    }

    /// Run until shutdown, the probe limit, or a halting fill.
    pub async fn run(&mut self, shutdown: CancellationToken) -> SchedulerSummary {
        let mut summary = SchedulerSummary {
            probes: 0,
            cancelled: 0,
            filled: 0,
            failed: 0,
            stop_reason: StopReason::Shutdown,
            halted_by: None,
        };
        let mut waiting = false;

        info!(
            order = %self.request,
            start = %self.window.start(),
            end = %self.window.end(),
            interval_secs = self.config.interval.as_secs(),
            "Scheduler started"
        );

        loop {
            if shutdown.is_cancelled() {
                summary.stop_reason = StopReason::Shutdown;
                break;
            }
            if self
                .config
                .max_probes
                .is_some_and(|max| summary.probes >= max)
            {
                summary.stop_reason = StopReason::MaxProbes;
                break;
            }

            let now = self.clock.now();
            let open = self.window.is_open_at(now);
            Metrics::trading_window(open);
            if !open {
                if !waiting {
                    info!(
                        local_time = %self.window.local_time(now).format("%a %H:%M"),
                        "Outside trading hours, waiting"
                    );
                    waiting = true;
                }
                if sleep_or_shutdown(self.config.idle_poll, &shutdown).await {
                    summary.stop_reason = StopReason::Shutdown;
                    break;
                }
                continue;
            }
            if waiting {
                info!("Trading hours open, resuming probes");
                waiting = false;
            }

            summary.probes += 1;
            let outcome = self.engine.run_probe(self.request.clone()).await;
            match &outcome {
                ProbeOutcome::Cancelled { .. } => summary.cancelled += 1,
                ProbeOutcome::Filled { .. } => summary.filled += 1,
                ProbeOutcome::Failed { error, .. } => {
                    summary.failed += 1;
                    warn!(error = %error, "Probe failed, continuing after interval");
                }
            }

            if outcome.is_fill_escape() && self.config.halt_on_fill_escape {
                error!(
                    order_id = ?outcome.order_id(),
                    "Halting probes after fill; manual intervention required"
                );
                summary.stop_reason = StopReason::FillEscape;
                summary.halted_by = Some(outcome);
                break;
            }

            if sleep_or_shutdown(self.config.interval, &shutdown).await {
                summary.stop_reason = StopReason::Shutdown;
                break;
            }
        }

        info!(
            probes = summary.probes,
            cancelled = summary.cancelled,
            filled = summary.filled,
            failed = summary.failed,
            reason = ?summary.stop_reason,
            "Scheduler stopped"
        );
        summary
    }
}

/// Sleep for `duration`. Returns true if shutdown was requested first.
async fn sleep_or_shutdown(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveTime, TimeZone, Weekday};
    use orderprobe_core::{OrderSide, Price, Quantity};
    use orderprobe_engine::ProbeConfig;
    use orderprobe_gateway::{PaperConfig, PaperVenue, VenueGateway};
    use orderprobe_reporter::RecordingSink;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// Wednesday 2026-01-07 10:00 at UTC+8.
    fn wednesday_morning() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 7, 2, 0, 0).unwrap())
    }

    /// Saturday 2026-01-10 10:00 at UTC+8.
    fn saturday_morning() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 10, 2, 0, 0).unwrap())
    }

    fn window() -> TradingWindow {
        TradingWindow::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
            TradingWindow::business_days(),
            8,
        )
        .unwrap()
    }

    fn config(max_probes: Option<u64>) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(30),
            idle_poll: Duration::from_secs(60),
            halt_on_fill_escape: true,
            max_probes,
        }
    }

    async fn scheduler(
        paper: PaperConfig,
        config: SchedulerConfig,
        clock: FixedClock,
    ) -> (Arc<RecordingSink>, Scheduler<FixedClock>) {
        let venue = Arc::new(PaperVenue::new(paper));
        venue.login().await.unwrap();
        let sink = Arc::new(RecordingSink::new());
        let engine = ProbeEngine::new(venue, sink.clone(), ProbeConfig::default());
        let request = OrderRequest::new("2330", OrderSide::Buy, Price::new(dec!(500)), Quantity(1));
        (sink, Scheduler::new(engine, request, window(), config, clock))
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_probes_inside_window() {
        let (sink, mut scheduler) =
            scheduler(PaperConfig::default(), config(Some(3)), wednesday_morning()).await;

        let summary = scheduler.run(CancellationToken::new()).await;

        assert_eq!(summary.stop_reason, StopReason::MaxProbes);
        assert_eq!(summary.probes, 3);
        assert_eq!(summary.cancelled, 3);
        assert_eq!(sink.len(), 3);
        for record in sink.records() {
            assert_eq!(record.latency, Duration::from_millis(30));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idles_outside_window() {
        let (sink, mut scheduler) =
            scheduler(PaperConfig::default(), config(None), saturday_morning()).await;

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(600)).await;
            trigger.cancel();
        });

        let summary = scheduler.run(shutdown).await;

        assert_eq!(summary.stop_reason, StopReason::Shutdown);
        assert_eq!(summary.probes, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_halts_on_fill() {
        let paper = PaperConfig {
            fill_every: Some(2),
            ..PaperConfig::default()
        };
        let (sink, mut scheduler) = scheduler(paper, config(Some(5)), wednesday_morning()).await;

        let summary = scheduler.run(CancellationToken::new()).await;

        assert_eq!(summary.stop_reason, StopReason::FillEscape);
        assert_eq!(summary.probes, 2);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.filled, 1);
        assert!(summary.halted_by.as_ref().is_some_and(ProbeOutcome::is_fill_escape));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continues_after_fill_when_not_halting() {
        let paper = PaperConfig {
            fill_every: Some(1),
            ..PaperConfig::default()
        };
        let mut cfg = config(Some(2));
        cfg.halt_on_fill_escape = false;
        let (_sink, mut scheduler) = scheduler(paper, cfg, wednesday_morning()).await;

        let summary = scheduler.run(CancellationToken::new()).await;

        assert_eq!(summary.stop_reason, StopReason::MaxProbes);
        assert_eq!(summary.filled, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continues_after_failure() {
        let paper = PaperConfig {
            reject_every: Some(1),
            ..PaperConfig::default()
        };
        let (sink, mut scheduler) = scheduler(paper, config(Some(2)), wednesday_morning()).await;

        let summary = scheduler.run(CancellationToken::new()).await;

        assert_eq!(summary.stop_reason, StopReason::MaxProbes);
        assert_eq!(summary.failed, 2);
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_interval() {
        let (sink, mut scheduler) =
            scheduler(PaperConfig::default(), config(None), wednesday_morning()).await;

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            trigger.cancel();
        });

        let summary = scheduler.run(shutdown).await;

        // Probes at t=0 and t=30s; shutdown lands in the second pause.
        assert_eq!(summary.stop_reason, StopReason::Shutdown);
        assert_eq!(summary.probes, 2);
        assert_eq!(sink.len(), 2);
        assert!(!scheduler.engine().correlator().is_open());
    }

    #[test]
    fn test_fixed_clock_weekdays() {
        let w = window();
        assert!(w.is_open_at(wednesday_morning().now()));
        assert!(!w.is_open_at(saturday_morning().now()));
        assert_eq!(w.local_time(saturday_morning().now()).weekday(), Weekday::Sat);
    }
}
