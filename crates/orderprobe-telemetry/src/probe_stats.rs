//! Periodic probe statistics.
//!
//! Reads the process-wide Prometheus metrics and summarizes them per
//! symbol: outcome counts, fallback and unconfirmed-cancel counts, and
//! latency percentiles estimated from histogram buckets.

use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use serde::Serialize;
use tracing::info;

use crate::metrics::{
    ACK_FALLBACK_TOTAL, CANCEL_UNCONFIRMED_TOTAL, FILL_ESCAPE_TOTAL, PROBES_TOTAL,
    PROBE_LATENCY_MS, REPORTS_TOTAL,
};

/// Statistics for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeStats {
    pub symbol: String,
    pub cancelled: u64,
    pub filled: u64,
    pub failed: u64,
    pub ack_fallbacks: u64,
    pub cancels_unconfirmed: u64,
    pub fill_escapes: u64,
    pub measured: u64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
}

/// Logs a statistics summary on demand.
pub struct ProbeStatsReporter {
    symbols: Vec<String>,
    start_time: DateTime<Utc>,
}

impl ProbeStatsReporter {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols,
            start_time: Utc::now(),
        }
    }

    pub fn get_stats(&self) -> Vec<ProbeStats> {
        self.symbols.iter().map(|s| self.symbol_stats(s)).collect()
    }

    fn symbol_stats(&self, symbol: &str) -> ProbeStats {
        let counter = |vec: &prometheus::CounterVec, labels: &[&str]| -> u64 {
            vec.with_label_values(labels).get() as u64
        };

        let (measured, buckets) = histogram_buckets(&PROBE_LATENCY_MS, symbol);
        let (p50, p95, p99) = if measured == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (
                percentile_from_buckets(&buckets, measured, 0.50),
                percentile_from_buckets(&buckets, measured, 0.95),
                percentile_from_buckets(&buckets, measured, 0.99),
            )
        };

        ProbeStats {
            symbol: symbol.to_string(),
            cancelled: counter(&PROBES_TOTAL, &[symbol, "cancelled"]),
            filled: counter(&PROBES_TOTAL, &[symbol, "filled"]),
            failed: counter(&PROBES_TOTAL, &[symbol, "failed"]),
            ack_fallbacks: counter(&ACK_FALLBACK_TOTAL, &[symbol]),
            cancels_unconfirmed: counter(&CANCEL_UNCONFIRMED_TOTAL, &[symbol]),
            fill_escapes: counter(&FILL_ESCAPE_TOTAL, &[symbol]),
            measured,
            latency_p50_ms: p50,
            latency_p95_ms: p95,
            latency_p99_ms: p99,
        }
    }

    /// Log the summary.
    pub fn output_summary(&self) {
        let duration = Utc::now() - self.start_time;
        let hours = duration.num_hours();
        let minutes = duration.num_minutes() % 60;

        info!("========== Probe Statistics ==========");
        info!(
            "Period: since {} ({} hours {} minutes)",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            hours,
            minutes
        );

        for s in self.get_stats() {
            info!("--- {} ---", s.symbol);
            info!(
                "  Probes: cancelled={} filled={} failed={}",
                s.cancelled, s.filled, s.failed
            );
            info!(
                "  Ack fallbacks: {}, unconfirmed cancels: {}, fill escapes: {}",
                s.ack_fallbacks, s.cancels_unconfirmed, s.fill_escapes
            );
            info!(
                "  Latency (ms, n={}): P50={:.1}, P95={:.1}, P99={:.1}",
                s.measured, s.latency_p50_ms, s.latency_p95_ms, s.latency_p99_ms
            );
        }

        info!(
            "Reports: delivered={} failed={}",
            REPORTS_TOTAL.with_label_values(&["ok"]).get() as u64,
            REPORTS_TOTAL.with_label_values(&["error"]).get() as u64
        );
        info!("======================================");
    }
}

/// Cumulative bucket counts for `symbol`, merged across latency sources.
fn histogram_buckets(histogram: &prometheus::HistogramVec, symbol: &str) -> (u64, Vec<(f64, u64)>) {
    let mut total = 0u64;
    let mut merged: Vec<(f64, u64)> = Vec::new();

    for mf in histogram.collect() {
        for m in mf.get_metric() {
            let is_symbol = m
                .get_label()
                .iter()
                .any(|pair| pair.get_name() == "symbol" && pair.get_value() == symbol);
            if !is_symbol {
                continue;
            }

            let h = m.get_histogram();
            total += h.get_sample_count();
            for (i, bucket) in h.get_bucket().iter().enumerate() {
                match merged.get_mut(i) {
                    Some(entry) => entry.1 += bucket.get_cumulative_count(),
                    None => merged.push((bucket.get_upper_bound(), bucket.get_cumulative_count())),
                }
            }
        }
    }
    (total, merged)
}

/// Percentile by linear interpolation within cumulative buckets.
fn percentile_from_buckets(buckets: &[(f64, u64)], total_count: u64, percentile: f64) -> f64 {
    let target = ((total_count as f64 * percentile).ceil() as u64).max(1);
    let mut prev_bound = 0.0;
    let mut prev_count = 0u64;

    for &(upper_bound, cumulative_count) in buckets {
        if cumulative_count >= target {
            let bucket_count = cumulative_count - prev_count;
            if bucket_count == 0 {
                return upper_bound;
            }
            let position = (target - prev_count) as f64 / bucket_count as f64;
            return prev_bound + position * (upper_bound - prev_bound);
        }
        prev_bound = upper_bound;
        prev_count = cumulative_count;
    }

    buckets.last().map(|b| b.0).unwrap_or(0.0)
}
