//! Simulated venue for paper mode.
//!
//! Accepts orders in-process, acknowledges them after a configurable
//! delay and withdraws them on cancel. Deterministic fault injection
//! (every Nth order rejected, unacknowledged, or filled) exercises the
//! probe's fallback and fill-escape paths without touching a real market.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use orderprobe_core::{EventKind, OrderId, OrderRequest};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{BoxFuture, EventHandler, StatusReport, VenueEvent, VenueGateway};
use crate::status_map::StatusMap;

/// Paper venue behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Delay before a submitted order is acknowledged (ms). Default: 30.
    #[serde(default = "default_ack_delay_ms")]
    pub ack_delay_ms: u64,
    /// Delay before a cancel is acknowledged (ms). Default: 30.
    #[serde(default = "default_cancel_delay_ms")]
    pub cancel_delay_ms: u64,
    /// Reject every Nth order with a failed ACK.
    #[serde(default)]
    pub reject_every: Option<u64>,
    /// Accept every Nth order silently (no ACK event is sent).
    #[serde(default)]
    pub drop_ack_every: Option<u64>,
    /// Fill every Nth order right after acknowledging it.
    #[serde(default)]
    pub fill_every: Option<u64>,
}

fn default_ack_delay_ms() -> u64 {
    30
}

fn default_cancel_delay_ms() -> u64 {
    30
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            ack_delay_ms: default_ack_delay_ms(),
            cancel_delay_ms: default_cancel_delay_ms(),
            reject_every: None,
            drop_ack_every: None,
            fill_every: None,
        }
    }
}

/// Finished orders kept answerable to status polls.
pub const TERMINAL_RETENTION: usize = 64;

fn nth(every: Option<u64>, seq: u64) -> bool {
    matches!(every, Some(n) if n > 0 && seq % n == 0)
}

fn is_terminal(raw: &str) -> bool {
    matches!(raw, "Cancelled" | "Filled" | "Failed")
}

#[derive(Default)]
struct Orders {
    /// Raw venue status per order.
    status: HashMap<OrderId, &'static str>,
    /// Finished orders, oldest first.
    finished: VecDeque<OrderId>,
}

/// State shared with the tasks that emit events.
struct PaperBook {
    orders: Mutex<Orders>,
    handler: RwLock<Option<EventHandler>>,
}

impl PaperBook {
    fn set(&self, order_id: &OrderId, raw: &'static str) {
        let mut orders = self.orders.lock();
        orders.status.insert(order_id.clone(), raw);
        if is_terminal(raw) {
            orders.finished.push_back(order_id.clone());
            while orders.finished.len() > TERMINAL_RETENTION {
                if let Some(oldest) = orders.finished.pop_front() {
                    orders.status.remove(&oldest);
                }
            }
        }
    }

    fn get(&self, order_id: &OrderId) -> Option<&'static str> {
        self.orders.lock().status.get(order_id).copied()
    }

    fn emit(&self, order_id: &OrderId, kind: EventKind, success: bool, raw: &str) {
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            let event = VenueEvent::new(order_id.clone(), kind, success)
                .with_payload(serde_json::json!({ "status": raw }));
            handler(event);
        }
    }
}

/// In-process simulated venue.
pub struct PaperVenue {
    config: PaperConfig,
    book: Arc<PaperBook>,
    status_map: StatusMap,
    seq: AtomicU64,
    logged_in: AtomicBool,
}

impl PaperVenue {
    #[must_use]
    pub fn new(config: PaperConfig) -> Self {
        Self {
            config,
            book: Arc::new(PaperBook {
                orders: Mutex::new(Orders::default()),
                handler: RwLock::new(None),
            }),
            status_map: StatusMap::default(),
            seq: AtomicU64::new(0),
            logged_in: AtomicBool::new(false),
        }
    }

    /// Orders the venue still tracks: all live ones plus the most
    /// recent [`TERMINAL_RETENTION`] finished ones.
    pub fn order_count(&self) -> usize {
        self.book.orders.lock().status.len()
    }
}

impl VenueGateway for PaperVenue {
    fn name(&self) -> &str {
        "paper"
    }

    fn login(&self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            self.logged_in.store(true, Ordering::SeqCst);
            info!("Paper venue session opened");
            Ok(())
        })
    }

    fn logout(&self) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            self.logged_in.store(false, Ordering::SeqCst);
            info!("Paper venue session closed");
            Ok(())
        })
    }

    fn submit(&self, request: OrderRequest) -> BoxFuture<'_, GatewayResult<OrderId>> {
        Box::pin(async move {
            if !self.logged_in.load(Ordering::SeqCst) {
                return Err(GatewayError::Disconnected);
            }

            let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            let order_id = OrderId::new(format!("P{}", &Uuid::new_v4().simple().to_string()[..8]));
            self.book.set(&order_id, "PendingSubmit");
            debug!(order_id = %order_id, seq, order = %request, "Paper order accepted");

            let reject = nth(self.config.reject_every, seq);
            let drop_ack = nth(self.config.drop_ack_every, seq);
            let fill = nth(self.config.fill_every, seq);
            let delay = Duration::from_millis(self.config.ack_delay_ms);
            let book = self.book.clone();
            let id = order_id.clone();

            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if reject {
                    book.set(&id, "Failed");
                    book.emit(&id, EventKind::Ack, false, "Failed");
                    return;
                }
                book.set(&id, "Submitted");
                if !drop_ack {
                    book.emit(&id, EventKind::Ack, true, "Submitted");
                }
                if fill {
                    book.set(&id, "Filled");
                    book.emit(&id, EventKind::Fill, true, "Filled");
                }
            });

            Ok(order_id)
        })
    }

    fn cancel(&self, order_id: OrderId) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            let raw = self
                .book
                .get(&order_id)
                .ok_or_else(|| GatewayError::Cancel(format!("unknown order {order_id}")))?;
            let live = self
                .status_map
                .map(raw)
                .map(|s| s.is_live())
                .unwrap_or(false);
            if !live {
                return Err(GatewayError::Cancel(format!(
                    "order {order_id} is not cancellable ({raw})"
                )));
            }

            let delay = Duration::from_millis(self.config.cancel_delay_ms);
            let book = self.book.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                book.set(&order_id, "Cancelled");
                book.emit(&order_id, EventKind::CancelAck, true, "Cancelled");
            });
            Ok(())
        })
    }

    fn poll_status(&self, order_id: OrderId) -> BoxFuture<'_, GatewayResult<StatusReport>> {
        Box::pin(async move {
            let raw = self.book.get(&order_id).unwrap_or("NotFound");
            self.status_map.report(raw)
        })
    }

    fn register_event_handler(&self, handler: EventHandler) {
        *self.book.handler.write() = Some(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderprobe_core::{OrderSide, Price, Quantity, VenueStatus};
    use rust_decimal_macros::dec;

    fn sample_request() -> OrderRequest {
        OrderRequest::new("2330", OrderSide::Buy, Price::new(dec!(500)), Quantity(1))
    }

    fn collecting(venue: &PaperVenue) -> Arc<Mutex<Vec<VenueEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        venue.register_event_handler(Arc::new(move |e| sink.lock().push(e)));
        seen
    }

    #[tokio::test]
    async fn test_submit_requires_login() {
        let venue = PaperVenue::new(PaperConfig::default());
        let err = venue.submit(sample_request()).await.unwrap_err();
        assert_eq!(err, GatewayError::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_then_cancel() {
        let venue = PaperVenue::new(PaperConfig::default());
        let seen = collecting(&venue);
        venue.login().await.unwrap();

        let id = venue.submit(sample_request()).await.unwrap();
        assert_eq!(venue.poll_status(id.clone()).await.unwrap().status, VenueStatus::Pending);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock()[0].kind, EventKind::Ack);
        assert_eq!(venue.poll_status(id.clone()).await.unwrap().status, VenueStatus::Submitted);

        venue.cancel(id.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock()[1].kind, EventKind::CancelAck);
        assert_eq!(venue.poll_status(id.clone()).await.unwrap().status, VenueStatus::Cancelled);

        // Cancelled orders cannot be cancelled again
        assert!(venue.cancel(id).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_injection() {
        let venue = PaperVenue::new(PaperConfig {
            reject_every: Some(3),
            drop_ack_every: Some(2),
            fill_every: Some(1),
            ..PaperConfig::default()
        });
        let seen = collecting(&venue);
        venue.login().await.unwrap();

        // seq 1: ack + fill
        let first = venue.submit(sample_request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // seq 2: fill, no ack
        let second = venue.submit(sample_request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        // seq 3: rejected
        let third = venue.submit(sample_request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let kinds: Vec<_> = seen
            .lock()
            .iter()
            .map(|e| (e.order_id.clone(), e.kind, e.success))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (first.clone(), EventKind::Ack, true),
                (first, EventKind::Fill, true),
                (second.clone(), EventKind::Fill, true),
                (third.clone(), EventKind::Ack, false),
            ]
        );
        assert_eq!(venue.poll_status(third).await.unwrap().status, VenueStatus::Rejected);
        assert_eq!(venue.poll_status(second).await.unwrap().status, VenueStatus::Filled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_orders_are_evicted() {
        let venue = PaperVenue::new(PaperConfig::default());
        venue.login().await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..TERMINAL_RETENTION + 10 {
            let id = venue.submit(sample_request()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            venue.cancel(id.clone()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            ids.push(id);
        }

        assert_eq!(venue.order_count(), TERMINAL_RETENTION);
        let oldest = ids.first().cloned().unwrap();
        let newest = ids.last().cloned().unwrap();
        assert_eq!(venue.poll_status(oldest).await.unwrap().status, VenueStatus::NotFound);
        assert_eq!(venue.poll_status(newest).await.unwrap().status, VenueStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_orders_are_kept() {
        let venue = PaperVenue::new(PaperConfig::default());
        venue.login().await.unwrap();

        let live = venue.submit(sample_request()).await.unwrap();
        for _ in 0..TERMINAL_RETENTION + 5 {
            let id = venue.submit(sample_request()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            venue.cancel(id).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert_eq!(venue.order_count(), TERMINAL_RETENTION + 1);
        assert_eq!(venue.poll_status(live).await.unwrap().status, VenueStatus::Submitted);
    }

    #[tokio::test]
    async fn test_unknown_order_polls_not_found() {
        let venue = PaperVenue::new(PaperConfig::default());
        let report = venue.poll_status(OrderId::from("nope")).await.unwrap();
        assert_eq!(report.status, VenueStatus::NotFound);
    }
}
