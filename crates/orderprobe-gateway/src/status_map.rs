//! Venue status string mapping.
//!
//! Each venue reports order status with its own vocabulary. Adapters keep
//! a [`StatusMap`] and translate raw strings before anything reaches the
//! probe engine.

use std::collections::HashMap;

use orderprobe_core::VenueStatus;

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::StatusReport;

/// Case-insensitive mapping from raw venue status strings to [`VenueStatus`].
#[derive(Debug, Clone)]
pub struct StatusMap {
    entries: HashMap<String, VenueStatus>,
}

impl Default for StatusMap {
    /// Status vocabulary of the Shioaji-style stock API.
    fn default() -> Self {
        Self::empty()
            .with("PendingSubmit", VenueStatus::Pending)
            .with("PreSubmitted", VenueStatus::Pending)
            .with("Submitted", VenueStatus::Submitted)
            .with("Filled", VenueStatus::Filled)
            .with("PartFilled", VenueStatus::PartFilled)
            .with("Cancelled", VenueStatus::Cancelled)
            .with("Failed", VenueStatus::Rejected)
            .with("NotFound", VenueStatus::NotFound)
    }
}

impl StatusMap {
    /// A map with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Add or replace a mapping.
    #[must_use]
    pub fn with(mut self, raw: &str, status: VenueStatus) -> Self {
        self.entries.insert(raw.to_ascii_lowercase(), status);
        self
    }

    /// Look up a raw status string.
    #[must_use]
    pub fn map(&self, raw: &str) -> Option<VenueStatus> {
        self.entries.get(&raw.trim().to_ascii_lowercase()).copied()
    }

    /// Build a status report from a raw status string.
    ///
    /// Unmapped strings are an error: the engine must never guess whether
    /// an unknown state is live.
    pub fn report(&self, raw: &str) -> GatewayResult<StatusReport> {
        self.map(raw)
            .map(|status| StatusReport::new(status, raw))
            .ok_or_else(|| GatewayError::Status(format!("unmapped venue status {raw:?}")))
    }
}
