//! Probe record and lifecycle states.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

use orderprobe_core::{OrderId, OrderRequest};

/// Lifecycle state of a probe.
///
/// ```text
/// PendingSubmit -> AwaitingAck -> Confirmed -> CancelRequested -> Cancelled
///       |               |             |               |
///       +-> Failed      +-> Filled    +-> Filled      +-> Filled
///                       +-> Failed    +-> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeState {
    PendingSubmit,
    AwaitingAck,
    Confirmed,
    CancelRequested,
    Cancelled,
    Filled,
    Failed,
}

impl ProbeState {
    /// Whether the probe has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Filled | Self::Failed)
    }

    /// Whether `next` is a legal successor.
    #[must_use]
    pub fn can_transition_to(&self, next: ProbeState) -> bool {
        use ProbeState::*;
        matches!(
            (self, next),
            (PendingSubmit, AwaitingAck | Failed)
                | (AwaitingAck, Confirmed | Filled | Failed)
                | (Confirmed, CancelRequested | Filled | Failed)
                | (CancelRequested, Cancelled | Filled)
        )
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PendingSubmit => "PENDING_SUBMIT",
            Self::AwaitingAck => "AWAITING_ACK",
            Self::Confirmed => "CONFIRMED",
            Self::CancelRequested => "CANCEL_REQUESTED",
            Self::Cancelled => "CANCELLED",
            Self::Filled => "FILLED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// One probe order and its measurement.
///
/// Owned by the engine for the duration of one cycle.
#[derive(Debug, Clone)]
pub struct Probe {
    id: u64,
    request: OrderRequest,
    order_id: Option<OrderId>,
    submit_time: Option<Instant>,
    ack_time: Option<Instant>,
    approximate: bool,
    state: ProbeState,
}

impl Probe {
    #[must_use]
    pub fn new(id: u64, request: OrderRequest) -> Self {
        Self {
            id,
            request,
            order_id: None,
            submit_time: None,
            ack_time: None,
            approximate: false,
            state: ProbeState::PendingSubmit,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &OrderRequest {
        &self.request
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        self.order_id.as_ref()
    }

    pub fn state(&self) -> ProbeState {
        self.state
    }

    pub fn submit_time(&self) -> Option<Instant> {
        self.submit_time
    }

    pub fn ack_time(&self) -> Option<Instant> {
        self.ack_time
    }

    pub fn is_approximate(&self) -> bool {
        self.approximate
    }

    /// Stamp the moment immediately before the submit call.
    pub fn mark_submit(&mut self, at: Instant) {
        self.submit_time = Some(at);
    }

    pub fn set_order_id(&mut self, order_id: OrderId) {
        self.order_id = Some(order_id);
    }

    /// Record the acknowledgment time. Only the first resolution counts.
    ///
    /// Clamped to the submit time so latency is never negative.
    pub fn confirm(&mut self, at: Instant, approximate: bool) -> bool {
        if self.ack_time.is_some() {
            return false;
        }
        let at = self.submit_time.map_or(at, |submit| at.max(submit));
        self.ack_time = Some(at);
        self.approximate = approximate;
        true
    }

    /// `ack_time - submit_time`, once both are set.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        match (self.submit_time, self.ack_time) {
            (Some(submit), Some(ack)) => Some(ack.saturating_duration_since(submit)),
            _ => None,
        }
    }

    /// Move to `next`. Illegal transitions are logged and ignored.
    pub fn advance(&mut self, next: ProbeState) {
        if !self.state.can_transition_to(next) {
            error!(
                probe_id = self.id,
                from = %self.state,
                to = %next,
                "Illegal probe state transition"
            );
            debug_assert!(false, "illegal transition {} -> {}", self.state, next);
            return;
        }
        debug!(probe_id = self.id, from = %self.state, to = %next, "Probe state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderprobe_core::{OrderSide, Price, Quantity};
    use rust_decimal_macros::dec;

    fn probe() -> Probe {
        let request = OrderRequest::new("2330", OrderSide::Buy, Price::new(dec!(580)), Quantity(1));
        Probe::new(1, request)
    }

    #[test]
    fn test_transitions() {
        use ProbeState::*;
        assert!(PendingSubmit.can_transition_to(AwaitingAck));
        assert!(PendingSubmit.can_transition_to(Failed));
        assert!(!PendingSubmit.can_transition_to(Confirmed));
        assert!(AwaitingAck.can_transition_to(Filled));
        assert!(CancelRequested.can_transition_to(Cancelled));
        assert!(!CancelRequested.can_transition_to(Failed));
        assert!(!Cancelled.can_transition_to(Filled));

        for terminal in [Cancelled, Filled, Failed] {
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn test_advance_happy_path() {
        let mut p = probe();
        for next in [
            ProbeState::AwaitingAck,
            ProbeState::Confirmed,
            ProbeState::CancelRequested,
            ProbeState::Cancelled,
        ] {
            p.advance(next);
            assert_eq!(p.state(), next);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_first_resolution_wins() {
        let mut p = probe();
        assert!(p.latency().is_none());

        p.mark_submit(Instant::now());
        tokio::time::advance(Duration::from_millis(42)).await;
        assert!(p.confirm(Instant::now(), false));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!p.confirm(Instant::now(), true));

        assert_eq!(p.latency(), Some(Duration::from_millis(42)));
        assert!(!p.is_approximate());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_never_negative() {
        let mut p = probe();
        let early = Instant::now();
        tokio::time::advance(Duration::from_millis(5)).await;
        p.mark_submit(Instant::now());
        p.confirm(early, false);
        assert_eq!(p.latency(), Some(Duration::ZERO));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ProbeState::CancelRequested.to_string(), "CANCEL_REQUESTED");
    }
}
