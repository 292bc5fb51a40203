//! Venue gateway trait for probe execution.
//!
//! Abstracts the trading venue client so that:
//! - the probe engine has one implementation for every venue
//! - tests drive the engine with a scripted gateway
//! - venue-specific status strings stay inside the adapter

use std::pin::Pin;
use std::sync::Arc;
use tokio::time::Instant;

use orderprobe_core::{EventKind, OrderId, OrderRequest, VenueStatus};

use crate::error::GatewayResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Asynchronous order event delivered by the venue.
#[derive(Debug, Clone)]
pub struct VenueEvent {
    /// Order the event refers to.
    pub order_id: OrderId,
    /// Event kind.
    pub kind: EventKind,
    /// Whether the venue reports the operation as successful
    /// (e.g. op code "00"). A failed ACK is a rejection.
    pub success: bool,
    /// Raw venue payload, kept for logging.
    pub payload: serde_json::Value,
}

impl VenueEvent {
    #[must_use]
    pub fn new(order_id: OrderId, kind: EventKind, success: bool) -> Self {
        Self {
            order_id,
            kind,
            success,
            payload: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Callback invoked by the gateway for every order event.
///
/// May be called from any thread, at any time after `submit`/`cancel`,
/// including before `submit` returns.
pub type EventHandler = Arc<dyn Fn(VenueEvent) + Send + Sync>;

/// Result of a direct status poll.
#[derive(Debug, Clone)]
pub struct StatusReport {
    /// Mapped status.
    pub status: VenueStatus,
    /// Raw venue status string.
    pub raw: String,
    /// Monotonic time the answer was received.
    pub received_at: Instant,
}

impl StatusReport {
    #[must_use]
    pub fn new(status: VenueStatus, raw: impl Into<String>) -> Self {
        Self {
            status,
            raw: raw.into(),
            received_at: Instant::now(),
        }
    }
}

/// Capability interface of a trading venue.
pub trait VenueGateway: Send + Sync {
    /// Human-readable venue name for logs.
    fn name(&self) -> &str;

    /// Authenticate / open the session. Default: no session needed.
    fn login(&self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Close the session. Default: no-op.
    fn logout(&self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async { Ok(()) })
    }

    /// Submit a limit order. Returns the venue's order identifier.
    fn submit(&self, request: OrderRequest) -> BoxFuture<'_, GatewayResult<OrderId>>;

    /// Request cancellation of an order.
    fn cancel(&self, order_id: OrderId) -> BoxFuture<'_, GatewayResult<()>>;

    /// Query the current status of an order directly.
    fn poll_status(&self, order_id: OrderId) -> BoxFuture<'_, GatewayResult<StatusReport>>;

    /// Register the callback that receives order events.
    ///
    /// Replaces any previously registered handler.
    fn register_event_handler(&self, handler: EventHandler);
}

/// Arc wrapper for VenueGateway trait objects.
pub type DynGateway = Arc<dyn VenueGateway>;
