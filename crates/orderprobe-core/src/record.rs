//! Latency record produced by a measured probe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::decimal::{Price, Quantity};
use crate::order::{OrderRequest, OrderSide};

/// Immutable result of one measured probe.
///
/// Produced once per probe that reached CONFIRMED and handed to the
/// reporter. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyRecord {
    /// Wall-clock time the record was produced (UTC).
    pub timestamp: DateTime<Utc>,
    /// Broker identity reported to the collector.
    pub broker: String,
    /// Instrument symbol.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Limit price of the probe.
    pub price: Price,
    /// Quantity of the probe.
    pub quantity: Quantity,
    /// Submit-to-acknowledgment round trip.
    pub latency: Duration,
    /// True when the acknowledgment time came from a fallback status poll
    /// rather than the venue's event.
    pub approximate: bool,
}

impl LatencyRecord {
    /// Build a record for the given probe order.
    #[must_use]
    pub fn new(
        broker: impl Into<String>,
        request: &OrderRequest,
        latency: Duration,
        approximate: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            broker: broker.into(),
            symbol: request.symbol.clone(),
            side: request.side,
            price: request.price,
            quantity: request.quantity,
            latency,
            approximate,
        }
    }

    /// Latency in fractional milliseconds.
    #[must_use]
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_nanos() as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_latency_ms() {
        let req = OrderRequest::new("2330", OrderSide::Sell, Price::new(dec!(1000)), Quantity(1));
        let record = LatencyRecord::new("sinotrade", &req, Duration::from_micros(12_345), false);
        assert!((record.latency_ms() - 12.345).abs() < 1e-9);
        assert_eq!(record.symbol, "2330");
        assert_eq!(record.side, OrderSide::Sell);
        assert!(!record.approximate);
    }
}
