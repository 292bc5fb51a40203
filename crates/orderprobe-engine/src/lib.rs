//! Probe lifecycle engine for orderprobe.
//!
//! Places a tiny non-marketable limit order, measures the time until the
//! venue acknowledges it, hands the measurement to a latency sink, and
//! withdraws the order again.
//!
//! - [`Correlator`]: single-flight slot joining venue events to the probe
//! - [`Probe`]: one probe and its lifecycle state
//! - [`ProbeEngine`]: drives a probe to a terminal [`ProbeOutcome`]

pub mod correlator;
pub mod engine;
pub mod error;
pub mod probe;

pub use correlator::{Correlator, Delivery};
pub use engine::{CancelConfirmation, ProbeConfig, ProbeEngine, ProbeOutcome};
pub use error::{CorrelatorError, CorrelatorResult, FillSource, ProbeError};
pub use probe::{Probe, ProbeState};
