//! Venue gateway seam for the latency probe.
//!
//! The probe engine talks to a trading venue only through the
//! [`VenueGateway`] trait: submit, cancel, status poll, and an
//! asynchronous event handler. Venue-specific status strings are mapped by
//! [`StatusMap`] so the engine has a single implementation.
//!
//! # Implementations
//!
//! - [`PaperVenue`]: in-process simulated venue for paper mode
//! - [`MockGateway`]: scriptable gateway for tests

pub mod error;
pub mod gateway;
pub mod mock;
pub mod paper;
pub mod status_map;

pub use error::{GatewayError, GatewayResult};
pub use gateway::{BoxFuture, DynGateway, EventHandler, StatusReport, VenueEvent, VenueGateway};
pub use mock::{MockGateway, ScriptedEvent};
pub use paper::{PaperConfig, PaperVenue};
pub use status_map::StatusMap;
