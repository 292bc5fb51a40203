//! Correlation slot between asynchronous venue events and the in-flight probe.
//!
//! The gateway delivers events on arbitrary threads, possibly before
//! `submit` has returned the order id. The correlator bridges them to the
//! probe task:
//!
//! - at most one slot is open at a time (single-flight)
//! - the first event of each kind is recorded; duplicates are ignored
//! - events for other order ids are discarded
//! - events that arrive while no slot is open are held in a short backlog
//!   and replayed when the matching slot opens
//! - a FILL releases any armed wait, whatever kind it was armed for

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use orderprobe_core::{EventKind, OrderId};
use orderprobe_gateway::{EventHandler, VenueEvent};

use crate::error::{CorrelatorError, CorrelatorResult};

/// Backlog capacity for events with no open slot.
pub const DEFAULT_BACKLOG_CAPACITY: usize = 32;

/// Maximum age of a backlogged event at replay time.
pub const DEFAULT_BACKLOG_MAX_AGE: Duration = Duration::from_secs(30);

/// An event accepted by the open slot.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub kind: EventKind,
    pub success: bool,
    pub payload: serde_json::Value,
    /// Monotonic time the correlator received the event.
    pub received_at: Instant,
}

impl Delivery {
    fn from_event(event: VenueEvent, received_at: Instant) -> Self {
        Self {
            kind: event.kind,
            success: event.success,
            payload: event.payload,
            received_at,
        }
    }

    /// True for a FILL.
    pub fn is_fill(&self) -> bool {
        self.kind == EventKind::Fill
    }
}

struct Waiter {
    kind: EventKind,
    tx: oneshot::Sender<Delivery>,
}

struct Slot {
    order_id: OrderId,
    /// First event of each kind.
    arrived: HashMap<EventKind, Delivery>,
    waiter: Option<Waiter>,
}

impl Slot {
    fn new(order_id: OrderId) -> Self {
        Self {
            order_id,
            arrived: HashMap::new(),
            waiter: None,
        }
    }

    /// Record the event and release the waiter if it matches.
    ///
    /// Returns false for a duplicate.
    fn accept(&mut self, delivery: Delivery) -> bool {
        if self.arrived.contains_key(&delivery.kind) {
            return false;
        }
        self.arrived.insert(delivery.kind, delivery.clone());

        let releases = self
            .waiter
            .as_ref()
            .is_some_and(|w| w.kind == delivery.kind || delivery.is_fill());
        if releases {
            if let Some(waiter) = self.waiter.take() {
                // Receiver may already be gone after a timeout.
                let _ = waiter.tx.send(delivery);
            }
        }
        true
    }

    /// A recorded event resolving a wait for `kind`. FILL takes precedence.
    fn resolved(&self, kind: EventKind) -> Option<Delivery> {
        self.arrived
            .get(&EventKind::Fill)
            .or_else(|| self.arrived.get(&kind))
            .cloned()
    }
}

struct Backlogged {
    order_id: OrderId,
    delivery: Delivery,
}

#[derive(Default)]
struct State {
    slot: Option<Slot>,
    backlog: VecDeque<Backlogged>,
}

/// Single-slot event correlator.
pub struct Correlator {
    state: Mutex<State>,
    backlog_capacity: usize,
    backlog_max_age: Duration,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Correlator")
            .field("open", &state.slot.as_ref().map(|s| s.order_id.clone()))
            .field("backlog", &state.backlog.len())
            .finish()
    }
}

impl Correlator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_backlog(DEFAULT_BACKLOG_CAPACITY, DEFAULT_BACKLOG_MAX_AGE)
    }

    #[must_use]
    pub fn with_backlog(capacity: usize, max_age: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            backlog_capacity: capacity,
            backlog_max_age: max_age,
        }
    }

    /// Event handler to register with the gateway.
    pub fn handler(self: &Arc<Self>) -> EventHandler {
        let correlator = Arc::clone(self);
        Arc::new(move |event| correlator.on_event(event))
    }

    /// Open the slot for `order_id`, replaying any backlogged events for it.
    pub fn open(&self, order_id: OrderId) -> CorrelatorResult<()> {
        let now = Instant::now();
        let mut state = self.state.lock();

        if let Some(slot) = &state.slot {
            return Err(CorrelatorError::AlreadyOpen {
                open: slot.order_id.clone(),
                requested: order_id,
            });
        }

        let mut slot = Slot::new(order_id);
        let max_age = self.backlog_max_age;
        for held in state.backlog.drain(..) {
            if held.order_id != slot.order_id {
                trace!(order_id = %held.order_id, kind = %held.delivery.kind, "Dropping unmatched backlog event");
                continue;
            }
            if now.saturating_duration_since(held.delivery.received_at) > max_age {
                debug!(order_id = %held.order_id, kind = %held.delivery.kind, "Dropping expired backlog event");
                continue;
            }
            debug!(order_id = %held.order_id, kind = %held.delivery.kind, "Replaying early event");
            slot.accept(held.delivery);
        }

        trace!(order_id = %slot.order_id, "Correlation slot opened");
        state.slot = Some(slot);
        Ok(())
    }

    /// Deliver a venue event. Safe to call from any thread.
    pub fn on_event(&self, event: VenueEvent) {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match state.slot.as_mut() {
            Some(slot) if slot.order_id == event.order_id => {
                let order_id = event.order_id.clone();
                let kind = event.kind;
                if slot.accept(Delivery::from_event(event, now)) {
                    trace!(%order_id, %kind, "Event accepted");
                } else {
                    debug!(%order_id, %kind, "Duplicate event ignored");
                }
            }
            Some(slot) => {
                debug!(
                    order_id = %event.order_id,
                    open = %slot.order_id,
                    kind = %event.kind,
                    "Stale event ignored"
                );
            }
            None => {
                if state.backlog.len() >= self.backlog_capacity {
                    state.backlog.pop_front();
                }
                trace!(order_id = %event.order_id, kind = %event.kind, "Event held with no open slot");
                let order_id = event.order_id.clone();
                state.backlog.push_back(Backlogged {
                    order_id,
                    delivery: Delivery::from_event(event, now),
                });
            }
        }
    }

    /// Wait for the first event of `kind` (or a FILL) on the open slot.
    ///
    /// Returns immediately if a matching event was already recorded.
    /// If the event and the timeout race, a recorded event wins.
    pub async fn await_confirmation(
        &self,
        kind: EventKind,
        timeout: Duration,
    ) -> CorrelatorResult<Delivery> {
        let rx = {
            let mut state = self.state.lock();
            let slot = state.slot.as_mut().ok_or(CorrelatorError::NotOpen)?;
            if let Some(delivery) = slot.resolved(kind) {
                return Ok(delivery);
            }
            let (tx, rx) = oneshot::channel();
            if slot.waiter.replace(Waiter { kind, tx }).is_some() {
                warn!(order_id = %slot.order_id, %kind, "Replaced an armed wait");
            }
            rx
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(delivery)) => Ok(delivery),
            Ok(Err(_)) => Err(CorrelatorError::Closed),
            Err(_) => {
                let mut state = self.state.lock();
                let slot = state.slot.as_mut().ok_or(CorrelatorError::Closed)?;
                slot.waiter = None;
                slot.resolved(kind).ok_or(CorrelatorError::Timeout)
            }
        }
    }

    /// First recorded event of `kind` on the open slot, if any.
    pub fn observed(&self, kind: EventKind) -> Option<Delivery> {
        self.state
            .lock()
            .slot
            .as_ref()
            .and_then(|slot| slot.arrived.get(&kind).cloned())
    }

    /// Close the slot. Any armed wait resolves with `Closed`. Idempotent.
    pub fn close(&self) {
        if let Some(slot) = self.state.lock().slot.take() {
            trace!(order_id = %slot.order_id, "Correlation slot closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().slot.is_some()
    }

    pub fn open_order_id(&self) -> Option<OrderId> {
        self.state.lock().slot.as_ref().map(|s| s.order_id.clone())
    }

    pub fn backlog_len(&self) -> usize {
        self.state.lock().backlog.len()
    }
}
