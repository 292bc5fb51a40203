//! Collector wire format.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use orderprobe_core::LatencyRecord;

/// JSON body POSTed to the collector.
///
/// ```json
/// {"timestamp":"2026-01-05T01:30:00.123456+00:00","broker":"paper",
///  "latency_ms":42.0,"symbol":"2330","side":"B","price":580.0,"volume":1}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    /// ISO-8601 production time.
    pub timestamp: String,
    pub broker: String,
    pub latency_ms: f64,
    pub symbol: String,
    /// "B" or "S".
    pub side: String,
    pub price: f64,
    pub volume: u64,
}

impl From<&LatencyRecord> for LatencyReport {
    fn from(record: &LatencyRecord) -> Self {
        Self {
            timestamp: record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, false),
            broker: record.broker.clone(),
            latency_ms: record.latency_ms(),
            symbol: record.symbol.clone(),
            side: record.side.wire_code().to_string(),
            price: record.price.to_f64(),
            volume: record.quantity.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use orderprobe_core::{OrderRequest, OrderSide, Price, Quantity};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[test]
    fn test_wire_format() {
        let request = OrderRequest::new("2330", OrderSide::Sell, Price::new(dec!(580.5)), Quantity(2));
        let mut record = LatencyRecord::new("paper", &request, Duration::from_micros(42_500), false);
        record.timestamp = Utc.with_ymd_and_hms(2026, 1, 5, 1, 30, 0).unwrap();

        let json = serde_json::to_value(LatencyReport::from(&record)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "timestamp": "2026-01-05T01:30:00.000000+00:00",
                "broker": "paper",
                "latency_ms": 42.5,
                "symbol": "2330",
                "side": "S",
                "price": 580.5,
                "volume": 2,
            })
        );
    }
}
