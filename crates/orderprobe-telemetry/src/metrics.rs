//! Prometheus metrics for orderprobe.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a build defect; it surfaces on first
//! use during startup, never mid-run.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, register_int_gauge,
    CounterVec, Gauge, HistogramVec, IntGauge,
};

/// Latency histogram buckets in milliseconds.
pub const LATENCY_BUCKETS_MS: &[f64] = &[
    5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0,
];

/// Completed probes.
/// Labels: symbol, outcome (cancelled/filled/failed)
pub static PROBES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderprobe_probes_total",
        "Completed probes by terminal outcome",
        &["symbol", "outcome"]
    )
    .unwrap()
});

/// Submit-to-acknowledgment latency.
/// Labels: symbol, source (event/poll)
pub static PROBE_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "orderprobe_latency_ms",
        "Submit to acknowledgment latency in milliseconds",
        &["symbol", "source"],
        LATENCY_BUCKETS_MS.to_vec()
    )
    .unwrap()
});

/// Acknowledgments resolved by the fallback status poll.
pub static ACK_FALLBACK_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderprobe_ack_fallback_total",
        "Acknowledgments resolved by status poll after timeout",
        &["symbol"]
    )
    .unwrap()
});

/// Cancels that were never confirmed by the venue.
pub static CANCEL_UNCONFIRMED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderprobe_cancel_unconfirmed_total",
        "Probe cancels without venue confirmation",
        &["symbol"]
    )
    .unwrap()
});

/// Probe orders that executed.
pub static FILL_ESCAPE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderprobe_fill_escape_total",
        "Probe orders filled before withdrawal",
        &["symbol"]
    )
    .unwrap()
});

/// Collector deliveries.
/// Labels: result (ok/error)
pub static REPORTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "orderprobe_reports_total",
        "Latency report deliveries by result",
        &["result"]
    )
    .unwrap()
});

/// Whether the trading window is open (1) or closed (0).
pub static TRADING_WINDOW_OPEN: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "orderprobe_trading_window_open",
        "Trading window state (1=open)"
    )
    .unwrap()
});

/// Probes in flight (0 or 1).
pub static PROBE_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("orderprobe_probe_in_flight", "Probe currently in flight").unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Record a probe reaching a terminal outcome.
    pub fn probe_completed(symbol: &str, outcome: &str) {
        PROBES_TOTAL.with_label_values(&[symbol, outcome]).inc();
    }

    /// Record a measured latency.
    pub fn probe_latency(symbol: &str, approximate: bool, latency_ms: f64) {
        let source = if approximate { "poll" } else { "event" };
        PROBE_LATENCY_MS
            .with_label_values(&[symbol, source])
            .observe(latency_ms);
    }

    pub fn ack_fallback(symbol: &str) {
        ACK_FALLBACK_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn cancel_unconfirmed(symbol: &str) {
        CANCEL_UNCONFIRMED_TOTAL.with_label_values(&[symbol]).inc();
    }

    pub fn fill_escape(symbol: &str) {
        FILL_ESCAPE_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// Record a collector delivery result.
    pub fn report_delivered(ok: bool) {
        let result = if ok { "ok" } else { "error" };
        REPORTS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn trading_window(open: bool) {
        TRADING_WINDOW_OPEN.set(if open { 1.0 } else { 0.0 });
    }

    pub fn probe_started() {
        PROBE_IN_FLIGHT.set(1);
    }

    pub fn probe_finished() {
        PROBE_IN_FLIGHT.set(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_counters() {
        Metrics::probe_completed("metrics-test", "cancelled");
        Metrics::probe_completed("metrics-test", "cancelled");
        Metrics::fill_escape("metrics-test");

        assert_eq!(
            PROBES_TOTAL
                .with_label_values(&["metrics-test", "cancelled"])
                .get(),
            2.0
        );
        assert_eq!(
            FILL_ESCAPE_TOTAL.with_label_values(&["metrics-test"]).get(),
            1.0
        );
    }

    #[test]
    fn test_latency_source_label() {
        Metrics::probe_latency("metrics-src", true, 12.0);
        let h = PROBE_LATENCY_MS.with_label_values(&["metrics-src", "poll"]);
        assert_eq!(h.get_sample_count(), 1);
        assert_eq!(
            PROBE_LATENCY_MS
                .with_label_values(&["metrics-src", "event"])
                .get_sample_count(),
            0
        );
    }
}
