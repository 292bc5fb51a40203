//! Probe engine.
//!
//! Drives one probe at a time through
//! submit -> acknowledge -> report -> cancel -> confirm, with a status poll
//! fallback when the acknowledgment event does not arrive and a
//! reconciliation poll when the cancel is not confirmed.
//!
//! The engine never retries a submit within a cycle and never leaves the
//! correlation slot open after a probe finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use orderprobe_core::{EventKind, LatencyRecord, OrderId, OrderRequest, VenueStatus};
use orderprobe_gateway::DynGateway;
use orderprobe_reporter::DynLatencySink;
use orderprobe_telemetry::Metrics;

use crate::correlator::{Correlator, Delivery};
use crate::error::{CorrelatorError, FillSource, ProbeError};
use crate::probe::{Probe, ProbeState};

/// Default acknowledgment timeout.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cancel confirmation timeout.
pub const DEFAULT_CANCEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Engine settings.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Broker identity written into latency records.
    pub broker: String,
    pub ack_timeout: Duration,
    pub cancel_timeout: Duration,
    /// Poll the order once when a cancel is not confirmed.
    pub reconcile_on_cancel_timeout: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            broker: "paper".to_string(),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            cancel_timeout: DEFAULT_CANCEL_TIMEOUT,
            reconcile_on_cancel_timeout: true,
        }
    }
}

/// How the withdrawal of a probe order was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelConfirmation {
    /// The venue sent a successful cancel acknowledgment.
    Acknowledged,
    /// No acknowledgment, but a status poll answered CANCELLED.
    ConfirmedByPoll,
    /// Not confirmed. The probe is still treated as cancelled.
    Unconfirmed(ProbeError),
}

/// Terminal result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Cancelled {
        order_id: OrderId,
        latency: Duration,
        approximate: bool,
        cancel: CancelConfirmation,
    },
    /// The probe order executed. Always alarmed.
    Filled {
        order_id: OrderId,
        latency: Option<Duration>,
        source: FillSource,
    },
    Failed {
        order_id: Option<OrderId>,
        error: ProbeError,
    },
}

impl ProbeOutcome {
    pub fn state(&self) -> ProbeState {
        match self {
            Self::Cancelled { .. } => ProbeState::Cancelled,
            Self::Filled { .. } => ProbeState::Filled,
            Self::Failed { .. } => ProbeState::Failed,
        }
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            Self::Cancelled { order_id, .. } | Self::Filled { order_id, .. } => Some(order_id),
            Self::Failed { order_id, .. } => order_id.as_ref(),
        }
    }

    /// Measured latency, if the probe got that far.
    pub fn latency(&self) -> Option<Duration> {
        match self {
            Self::Cancelled { latency, .. } => Some(*latency),
            Self::Filled { latency, .. } => *latency,
            Self::Failed { .. } => None,
        }
    }

    pub fn is_fill_escape(&self) -> bool {
        matches!(self, Self::Filled { .. })
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cancelled { .. } => "cancelled",
            Self::Filled { .. } => "filled",
            Self::Failed { .. } => "failed",
        }
    }
}

enum AckResolution {
    Confirmed { at: Instant, approximate: bool },
    Filled(FillSource),
    Failed(ProbeError),
}

enum CancelPhase {
    Done(CancelConfirmation),
    Filled(FillSource),
}

/// Runs probes against a venue gateway.
///
/// `run_probe` takes `&mut self`, so a single engine can never have two
/// probes in flight.
pub struct ProbeEngine {
    gateway: DynGateway,
    sink: DynLatencySink,
    correlator: Arc<Correlator>,
    config: ProbeConfig,
    next_probe_id: u64,
}

impl ProbeEngine {
    /// Create an engine and register its event handler with the gateway.
    pub fn new(gateway: DynGateway, sink: DynLatencySink, config: ProbeConfig) -> Self {
        let correlator = Arc::new(Correlator::new());
        gateway.register_event_handler(correlator.handler());
        Self {
            gateway,
            sink,
            correlator,
            config,
            next_probe_id: 0,
        }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    /// Run one probe to a terminal state.
    ///
    /// Never returns an error: every failure is folded into the outcome.
    pub async fn run_probe(&mut self, request: OrderRequest) -> ProbeOutcome {
        self.next_probe_id += 1;
        let mut probe = Probe::new(self.next_probe_id, request);
        let span = info_span!(
            "probe",
            probe_id = probe.id(),
            symbol = %probe.request().symbol
        );

        let this = &*self;
        async move {
            Metrics::probe_started();
            let outcome = this.drive(&mut probe).await;
            this.correlator.close();
            Metrics::probe_finished();
            this.finish(&probe, &outcome);
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, probe: &mut Probe) -> ProbeOutcome {
        let request = probe.request().clone();
        debug!(order = %request, "Submitting probe order");

        probe.mark_submit(Instant::now());
        let order_id = match self.gateway.submit(request).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Submit failed");
                probe.advance(ProbeState::Failed);
                return ProbeOutcome::Failed {
                    order_id: None,
                    error: ProbeError::Submit(e),
                };
            }
        };
        probe.set_order_id(order_id.clone());

        if let Err(e) = self.correlator.open(order_id.clone()) {
            error!(%order_id, error = %e, "Cannot correlate probe; withdrawing order");
            self.cancel_best_effort(&order_id).await;
            probe.advance(ProbeState::Failed);
            return ProbeOutcome::Failed {
                order_id: Some(order_id),
                error: e.into(),
            };
        }
        probe.advance(ProbeState::AwaitingAck);
        debug!(%order_id, "Order submitted, awaiting acknowledgment");

        let (at, approximate) = match self.await_ack(probe, &order_id).await {
            AckResolution::Confirmed { at, approximate } => (at, approximate),
            AckResolution::Filled(source) => return self.fill_escape(probe, order_id, source),
            AckResolution::Failed(error) => {
                if matches!(error, ProbeError::AckTimeout(_) | ProbeError::Correlator(_)) {
                    if let Some(source) = self.withdraw(&order_id).await {
                        return self.fill_escape(probe, order_id, source);
                    }
                }
                warn!(%order_id, error = %error, "Probe failed before acknowledgment");
                probe.advance(ProbeState::Failed);
                return ProbeOutcome::Failed {
                    order_id: Some(order_id),
                    error,
                };
            }
        };

        probe.confirm(at, approximate);
        probe.advance(ProbeState::Confirmed);
        let latency = probe.latency().unwrap_or_default();
        let latency_ms = as_ms(latency);
        info!(%order_id, latency_ms, approximate, "Order acknowledged");
        Metrics::probe_latency(&probe.request().symbol, approximate, latency_ms);

        if self.correlator.observed(EventKind::Fill).is_some() {
            return self.fill_escape(probe, order_id, FillSource::Event);
        }

        self.sink.submit(LatencyRecord::new(
            self.config.broker.clone(),
            probe.request(),
            latency,
            approximate,
        ));

        probe.advance(ProbeState::CancelRequested);
        match self.cancel_and_confirm(&order_id).await {
            CancelPhase::Filled(source) => self.fill_escape(probe, order_id, source),
            CancelPhase::Done(cancel) => {
                if let CancelConfirmation::Unconfirmed(reason) = &cancel {
                    warn!(%order_id, reason = %reason, "Cancel not confirmed; treating probe as cancelled");
                    Metrics::cancel_unconfirmed(&probe.request().symbol);
                }
                probe.advance(ProbeState::Cancelled);
                ProbeOutcome::Cancelled {
                    order_id,
                    latency,
                    approximate,
                    cancel,
                }
            }
        }
    }

    async fn await_ack(&self, probe: &Probe, order_id: &OrderId) -> AckResolution {
        match self
            .correlator
            .await_confirmation(EventKind::Ack, self.config.ack_timeout)
            .await
        {
            Ok(delivery) => resolve_ack_event(&delivery),
            Err(CorrelatorError::Timeout) => {
                warn!(
                    %order_id,
                    timeout_ms = self.config.ack_timeout.as_millis() as u64,
                    "No acknowledgment event; polling order status"
                );
                Metrics::ack_fallback(&probe.request().symbol);
                self.fallback_poll(order_id).await
            }
            Err(e) => AckResolution::Failed(e.into()),
        }
    }

    async fn fallback_poll(&self, order_id: &OrderId) -> AckResolution {
        let polled = self.gateway.poll_status(order_id.clone()).await;

        // Events recorded while the poll was in flight outrank its answer,
        // including a failed answer.
        if self.correlator.observed(EventKind::Fill).is_some() {
            return AckResolution::Filled(FillSource::Event);
        }
        if let Some(delivery) = self.correlator.observed(EventKind::Ack) {
            let beat_poll = polled
                .as_ref()
                .map_or(true, |report| delivery.received_at <= report.received_at);
            if beat_poll {
                debug!(%order_id, "Acknowledgment event arrived during status poll");
                return resolve_ack_event(&delivery);
            }
        }

        let report = match polled {
            Ok(report) => report,
            Err(e) => return AckResolution::Failed(ProbeError::AckTimeout(e)),
        };

        match report.status {
            status if status.is_live() => {
                warn!(%order_id, %status, "Order live per status poll; latency is approximate");
                AckResolution::Confirmed {
                    at: report.received_at,
                    approximate: true,
                }
            }
            status if status.is_fill() => AckResolution::Filled(FillSource::Poll(status)),
            VenueStatus::Rejected => AckResolution::Failed(ProbeError::Rejected(report.raw)),
            status => AckResolution::Failed(ProbeError::UnexpectedStatus {
                status,
                raw: report.raw,
            }),
        }
    }

    async fn cancel_and_confirm(&self, order_id: &OrderId) -> CancelPhase {
        if let Err(e) = self.gateway.cancel(order_id.clone()).await {
            warn!(%order_id, error = %e, "Cancel request failed");
            return self
                .reconcile(order_id, ProbeError::Cancel(e.to_string()))
                .await;
        }
        debug!(%order_id, "Cancel requested, awaiting confirmation");

        let phase = match self
            .correlator
            .await_confirmation(EventKind::CancelAck, self.config.cancel_timeout)
            .await
        {
            Ok(delivery) if delivery.is_fill() => CancelPhase::Filled(FillSource::Event),
            Ok(delivery) if delivery.success => CancelPhase::Done(CancelConfirmation::Acknowledged),
            Ok(delivery) => {
                let reason = ProbeError::Cancel(format!("venue refused cancel: {}", delivery.payload));
                self.reconcile(order_id, reason).await
            }
            Err(CorrelatorError::Timeout) => {
                warn!(
                    %order_id,
                    timeout_ms = self.config.cancel_timeout.as_millis() as u64,
                    "No cancel acknowledgment"
                );
                self.reconcile(order_id, ProbeError::CancelTimeout).await
            }
            Err(e) => self.reconcile(order_id, e.into()).await,
        };

        match phase {
            CancelPhase::Done(_) if self.correlator.observed(EventKind::Fill).is_some() => {
                CancelPhase::Filled(FillSource::Event)
            }
            phase => phase,
        }
    }

    /// One status poll to settle an unconfirmed cancel.
    async fn reconcile(&self, order_id: &OrderId, reason: ProbeError) -> CancelPhase {
        if self.correlator.observed(EventKind::Fill).is_some() {
            return CancelPhase::Filled(FillSource::Event);
        }
        if !self.config.reconcile_on_cancel_timeout {
            return CancelPhase::Done(CancelConfirmation::Unconfirmed(reason));
        }

        match self.gateway.poll_status(order_id.clone()).await {
            Ok(report) if report.status == VenueStatus::Cancelled => {
                info!(%order_id, "Cancel confirmed by status poll");
                CancelPhase::Done(CancelConfirmation::ConfirmedByPoll)
            }
            Ok(report) if report.status.is_fill() => {
                CancelPhase::Filled(FillSource::Poll(report.status))
            }
            Ok(report) => {
                warn!(%order_id, status = %report.status, raw = %report.raw, "Status poll did not confirm cancel");
                CancelPhase::Done(CancelConfirmation::Unconfirmed(reason))
            }
            Err(e) => {
                warn!(%order_id, error = %e, "Status poll after cancel failed");
                CancelPhase::Done(CancelConfirmation::Unconfirmed(reason))
            }
        }
    }

    /// Withdraw the open probe order whose state is unknown.
    ///
    /// Never cancels once a fill has been seen; returns where it was seen.
    async fn withdraw(&self, order_id: &OrderId) -> Option<FillSource> {
        if self.correlator.observed(EventKind::Fill).is_some() {
            return Some(FillSource::Event);
        }
        self.cancel_best_effort(order_id).await;
        None
    }

    async fn cancel_best_effort(&self, order_id: &OrderId) {
        if let Err(e) = self.gateway.cancel(order_id.clone()).await {
            warn!(%order_id, error = %e, "Best-effort cancel failed");
        }
    }

    fn fill_escape(&self, probe: &mut Probe, order_id: OrderId, source: FillSource) -> ProbeOutcome {
        error!(
            alarm = "fill_escape",
            %order_id,
            %source,
            order = %probe.request(),
            "PROBE ORDER FILLED: live position created, operator action required"
        );
        Metrics::fill_escape(&probe.request().symbol);
        probe.advance(ProbeState::Filled);
        ProbeOutcome::Filled {
            order_id,
            latency: probe.latency(),
            source,
        }
    }

    fn finish(&self, probe: &Probe, outcome: &ProbeOutcome) {
        debug_assert_eq!(probe.state(), outcome.state());
        Metrics::probe_completed(&probe.request().symbol, outcome.label());

        match outcome {
            ProbeOutcome::Cancelled { latency, cancel, .. } => info!(
                state = %probe.state(),
                latency_ms = as_ms(*latency),
                approximate = probe.is_approximate(),
                cancel = ?cancel,
                "Probe complete"
            ),
            ProbeOutcome::Filled { .. } => error!(state = %probe.state(), "Probe ended in a fill"),
            ProbeOutcome::Failed { error, .. } => warn!(
                state = %probe.state(),
                error = %error,
                "Probe failed"
            ),
        }
    }
}

fn resolve_ack_event(delivery: &Delivery) -> AckResolution {
    if delivery.is_fill() {
        AckResolution::Filled(FillSource::Event)
    } else if delivery.success {
        AckResolution::Confirmed {
            at: delivery.received_at,
            approximate: false,
        }
    } else {
        AckResolution::Failed(ProbeError::Rejected(delivery.payload.to_string()))
    }
}

fn as_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}
