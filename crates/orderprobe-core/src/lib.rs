//! Core domain types for the order-submission latency probe.
//!
//! This crate provides the types shared by every other crate:
//! - `OrderId`, `OrderSide`, `OrderRequest`: the probe order and its venue handle
//! - `Price`, `Quantity`: precision-safe numeric types
//! - `VenueStatus`, `EventKind`: the venue's view of an order
//! - `LatencyRecord`: the immutable output of a measured probe
//! - `TradingWindow`: venue-local trading hours and weekday gating

pub mod decimal;
pub mod error;
pub mod order;
pub mod record;
pub mod status;
pub mod trading_window;

pub use decimal::{Price, Quantity};
pub use error::{CoreError, Result};
pub use order::{OrderId, OrderRequest, OrderSide};
pub use record::LatencyRecord;
pub use status::{EventKind, VenueStatus};
pub use trading_window::{parse_hhmm, TradingWindow};
