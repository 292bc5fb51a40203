//! Scriptable venue gateway for tests.
//!
//! Records every call and replays scripted venue behaviour: submit
//! results, events emitted after submit or cancel (with delays), cancel
//! results and status poll answers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use orderprobe_core::{EventKind, OrderId, OrderRequest, VenueStatus};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{BoxFuture, EventHandler, StatusReport, VenueEvent, VenueGateway};

/// An event the mock emits in response to a submit or cancel.
#[derive(Debug, Clone)]
pub struct ScriptedEvent {
    /// Delay after the triggering call before the event is delivered.
    pub delay: Duration,
    /// Event kind.
    pub kind: EventKind,
    /// Venue success flag.
    pub success: bool,
    /// Deliver synchronously, before the triggering call returns.
    pub before_return: bool,
    /// Deliver the event this many times (duplicate delivery).
    pub repeat: usize,
}

impl ScriptedEvent {
    #[must_use]
    pub fn after(delay: Duration, kind: EventKind, success: bool) -> Self {
        Self {
            delay,
            kind,
            success,
            before_return: false,
            repeat: 1,
        }
    }

    /// Deliver before the triggering call returns to its caller.
    #[must_use]
    pub fn inline(kind: EventKind, success: bool) -> Self {
        Self {
            delay: Duration::ZERO,
            kind,
            success,
            before_return: true,
            repeat: 1,
        }
    }

    #[must_use]
    pub fn repeated(mut self, times: usize) -> Self {
        self.repeat = times;
        self
    }
}

/// Mock venue gateway.
pub struct MockGateway {
    /// Scripted submit results, consumed in order. When empty, submits
    /// succeed with a generated id.
    submit_results: Mutex<VecDeque<GatewayResult<OrderId>>>,
    /// Events emitted after every successful submit.
    on_submit: Mutex<Vec<ScriptedEvent>>,
    /// Events emitted after every successful cancel.
    on_cancel: Mutex<Vec<ScriptedEvent>>,
    /// Events emitted on every status poll, before it answers.
    on_poll: Mutex<Vec<ScriptedEvent>>,
    /// Result returned by cancel.
    cancel_result: Mutex<GatewayResult<()>>,
    /// Answer returned by status polls (raw string mapped by the caller's view).
    poll_result: Mutex<GatewayResult<VenueStatus>>,
    /// Result returned by login.
    login_result: Mutex<GatewayResult<()>>,
    /// Recorded calls.
    submits: Mutex<Vec<OrderRequest>>,
    cancels: Mutex<Vec<OrderId>>,
    polls: Mutex<Vec<OrderId>>,
    handler: RwLock<Option<EventHandler>>,
    next_id: AtomicU64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGateway")
            .field("submits", &self.submits.lock().len())
            .field("cancels", &self.cancels.lock().len())
            .field("polls", &self.polls.lock().len())
            .field("has_handler", &self.handler.read().is_some())
            .finish()
    }
}

impl MockGateway {
    /// Create a mock that accepts everything and emits no events.
    pub fn new() -> Self {
        Self {
            submit_results: Mutex::new(VecDeque::new()),
            on_submit: Mutex::new(Vec::new()),
            on_cancel: Mutex::new(Vec::new()),
            on_poll: Mutex::new(Vec::new()),
            cancel_result: Mutex::new(Ok(())),
            poll_result: Mutex::new(Ok(VenueStatus::Submitted)),
            login_result: Mutex::new(Ok(())),
            submits: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
            polls: Mutex::new(Vec::new()),
            handler: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue the result of the next submit.
    pub fn push_submit_result(&self, result: GatewayResult<OrderId>) {
        self.submit_results.lock().push_back(result);
    }

    /// Shorthand for a submit failure.
    pub fn reject_next_submit(&self, reason: &str) {
        self.push_submit_result(Err(GatewayError::Submit(reason.to_string())));
    }

    /// Set the events emitted after each successful submit.
    pub fn set_submit_events(&self, events: Vec<ScriptedEvent>) {
        *self.on_submit.lock() = events;
    }

    /// Set the events emitted after each successful cancel.
    pub fn set_cancel_events(&self, events: Vec<ScriptedEvent>) {
        *self.on_cancel.lock() = events;
    }

    /// Set the events emitted by each status poll.
    pub fn set_poll_events(&self, events: Vec<ScriptedEvent>) {
        *self.on_poll.lock() = events;
    }

    /// Set the result returned by cancel.
    pub fn set_cancel_result(&self, result: GatewayResult<()>) {
        *self.cancel_result.lock() = result;
    }

    /// Set the answer returned by status polls.
    pub fn set_poll_result(&self, result: GatewayResult<VenueStatus>) {
        *self.poll_result.lock() = result;
    }

    /// Set the result returned by login.
    pub fn set_login_result(&self, result: GatewayResult<()>) {
        *self.login_result.lock() = result;
    }

    /// Deliver an event to the registered handler right now.
    pub fn emit(&self, event: VenueEvent) {
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    pub fn submits(&self) -> Vec<OrderRequest> {
        self.submits.lock().clone()
    }

    pub fn cancels(&self) -> Vec<OrderId> {
        self.cancels.lock().clone()
    }

    pub fn polls(&self) -> Vec<OrderId> {
        self.polls.lock().clone()
    }

    pub fn has_handler(&self) -> bool {
        self.handler.read().is_some()
    }

    fn play(&self, order_id: &OrderId, script: Vec<ScriptedEvent>) {
        let Some(handler) = self.handler.read().clone() else {
            return;
        };

        for scripted in script {
            let event = VenueEvent::new(order_id.clone(), scripted.kind, scripted.success);
            if scripted.before_return {
                for _ in 0..scripted.repeat {
                    handler(event.clone());
                }
                continue;
            }

            let handler = handler.clone();
            tokio::spawn(async move {
                tokio::time::sleep(scripted.delay).await;
                for _ in 0..scripted.repeat {
                    handler(event.clone());
                }
            });
        }
    }
}

impl VenueGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    fn login(&self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move { self.login_result.lock().clone() })
    }

    fn submit(&self, request: OrderRequest) -> BoxFuture<'_, GatewayResult<OrderId>> {
        Box::pin(async move {
            self.submits.lock().push(request);

            let result = self.submit_results.lock().pop_front().unwrap_or_else(|| {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                Ok(OrderId::new(format!("mock-{n}")))
            });

            if let Ok(ref order_id) = result {
                let script = self.on_submit.lock().clone();
                self.play(order_id, script);
            }
            result
        })
    }

    fn cancel(&self, order_id: OrderId) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            self.cancels.lock().push(order_id.clone());

            let result = self.cancel_result.lock().clone();
            if result.is_ok() {
                let script = self.on_cancel.lock().clone();
                self.play(&order_id, script);
            }
            result
        })
    }

    fn poll_status(&self, order_id: OrderId) -> BoxFuture<'_, GatewayResult<StatusReport>> {
        Box::pin(async move {
            self.polls.lock().push(order_id.clone());
            let script = self.on_poll.lock().clone();
            self.play(&order_id, script);
            let status = self.poll_result.lock().clone()?;
            Ok(StatusReport::new(status, status.to_string()))
        })
    }

    fn register_event_handler(&self, handler: EventHandler) {
        *self.handler.write() = Some(handler);
    }
}
