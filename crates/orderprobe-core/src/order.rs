//! Order-related types and identifiers.
//!
//! Provides the probe order request, its side, and the opaque order
//! identifier the venue assigns on submission.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::decimal::{Price, Quantity};
use crate::error::CoreError;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Single-letter code used by the latency collector ("B" / "S").
    pub fn wire_code(&self) -> &'static str {
        match self {
            Self::Buy => "B",
            Self::Sell => "S",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = CoreError;

    /// Accepts `buy`/`sell` and the `B`/`S` shorthand, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" => Ok(Self::Buy),
            "sell" | "s" => Ok(Self::Sell),
            other => Err(CoreError::InvalidSide(other.to_string())),
        }
    }
}

/// Opaque order identifier assigned by the venue.
///
/// The only key used to correlate asynchronous venue events with the
/// probe that is currently open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A limit order the probe submits to the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Instrument symbol (e.g. "2330").
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Limit price. Probes are priced away from the market so they rest.
    pub price: Price,
    /// Order quantity.
    pub quantity: Quantity,
    /// Venue account reference, if the venue needs one.
    #[serde(default)]
    pub account: Option<String>,
}

impl OrderRequest {
    #[must_use]
    pub fn new(symbol: impl Into<String>, side: OrderSide, price: Price, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            price,
            quantity,
            account: None,
        }
    }

    #[must_use]
    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} x{}", self.symbol, self.side, self.price, self.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_side_parse() {
        assert_eq!("buy".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!("Sell".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert_eq!("B".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!(" s ".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!("hold".parse::<OrderSide>().is_err());
    }

    #[test]
    fn test_order_side_wire_code() {
        assert_eq!(OrderSide::Buy.wire_code(), "B");
        assert_eq!(OrderSide::Sell.wire_code(), "S");
    }

    #[test]
    fn test_order_request_display() {
        let req = OrderRequest::new("2330", OrderSide::Buy, Price::new(dec!(580)), Quantity(1))
            .with_account("9A95-1234567");
        assert_eq!(req.to_string(), "2330 buy 580 x1");
        assert_eq!(req.account.as_deref(), Some("9A95-1234567"));
    }
}
