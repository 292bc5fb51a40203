//! Venue-side order status and event kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order status as reported by a venue status poll.
///
/// Venue adapters map their own status strings onto this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VenueStatus {
    /// Accepted by the broker, not yet confirmed by the exchange.
    Pending,
    /// Resting in the book.
    Submitted,
    /// Completely executed.
    Filled,
    /// Partially executed.
    PartFilled,
    /// Withdrawn.
    Cancelled,
    /// Refused by the broker or exchange.
    Rejected,
    /// The venue has no record of the order.
    NotFound,
}

impl VenueStatus {
    /// Returns true if the order is live in the book and can still be cancelled.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Submitted)
    }

    /// Returns true if any quantity executed.
    #[must_use]
    pub fn is_fill(&self) -> bool {
        matches!(self, Self::Filled | Self::PartFilled)
    }
}

impl fmt::Display for VenueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Submitted => "SUBMITTED",
            Self::Filled => "FILLED",
            Self::PartFilled => "PART_FILLED",
            Self::Cancelled => "CANCELLED",
            Self::Rejected => "REJECTED",
            Self::NotFound => "NOT_FOUND",
        };
        write!(f, "{s}")
    }
}

/// Kind of asynchronous event the venue delivers for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Submission acknowledged (or refused, see the event's success flag).
    Ack,
    /// Cancellation acknowledged (or refused).
    CancelAck,
    /// Some or all of the order executed.
    Fill,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => write!(f, "ACK"),
            Self::CancelAck => write!(f, "CANCEL_ACK"),
            Self::Fill => write!(f, "FILL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_statuses() {
        assert!(VenueStatus::Pending.is_live());
        assert!(VenueStatus::Submitted.is_live());
        assert!(!VenueStatus::Filled.is_live());
        assert!(!VenueStatus::NotFound.is_live());
    }

    #[test]
    fn test_fill_statuses() {
        assert!(VenueStatus::Filled.is_fill());
        assert!(VenueStatus::PartFilled.is_fill());
        assert!(!VenueStatus::Cancelled.is_fill());
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&VenueStatus::PartFilled).unwrap();
        assert_eq!(json, "\"PART_FILLED\"");
        assert_eq!(VenueStatus::NotFound.to_string(), "NOT_FOUND");
        assert_eq!(EventKind::CancelAck.to_string(), "CANCEL_ACK");
    }
}
