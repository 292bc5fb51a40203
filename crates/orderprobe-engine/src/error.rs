//! Probe engine error types.

use orderprobe_core::{OrderId, VenueStatus};
use orderprobe_gateway::GatewayError;
use thiserror::Error;

/// Errors raised by the correlation slot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CorrelatorError {
    /// A second probe tried to open while one is in flight.
    #[error("Correlation slot already open for {open} (requested {requested})")]
    AlreadyOpen { open: OrderId, requested: OrderId },

    #[error("No correlation slot is open")]
    NotOpen,

    #[error("Timed out waiting for venue event")]
    Timeout,

    /// The slot was closed while a wait was armed.
    #[error("Correlation slot closed while waiting")]
    Closed,
}

pub type CorrelatorResult<T> = Result<T, CorrelatorError>;

/// Where a fill was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSource {
    /// A FILL event from the venue.
    Event,
    /// A status poll answered FILLED or PART_FILLED.
    Poll(VenueStatus),
}

impl std::fmt::Display for FillSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Event => write!(f, "fill event"),
            Self::Poll(status) => write!(f, "status poll ({status})"),
        }
    }
}

/// Probe failure taxonomy.
///
/// Every gateway error is mapped onto one of these at the engine boundary;
/// nothing reaches the scheduler as a raw gateway error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    /// Submission failed; no order exists.
    #[error("Submit failed: {0}")]
    Submit(GatewayError),

    /// No acknowledgment and the fallback poll could not establish the order state.
    #[error("Acknowledgment timed out and status poll failed: {0}")]
    AckTimeout(GatewayError),

    /// The venue refused the order.
    #[error("Order rejected: {0}")]
    Rejected(String),

    /// The probe order executed before it could be withdrawn.
    #[error("Probe order {order_id} filled ({fill_source})")]
    FillEscape {
        order_id: OrderId,
        fill_source: FillSource,
    },

    #[error("Cancel acknowledgment timed out")]
    CancelTimeout,

    /// The cancel call failed or the venue refused the cancel.
    #[error("Cancel failed: {0}")]
    Cancel(String),

    /// A status poll answered with a state the probe cannot continue from.
    #[error("Unexpected order status {status} ({raw})")]
    UnexpectedStatus { status: VenueStatus, raw: String },

    #[error("Correlator error: {0}")]
    Correlator(#[from] CorrelatorError),
}
