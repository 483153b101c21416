//! Process-wide halt after a ban signal.
//!
//! The controller is an explicit handle: every phase context carries a clone,
//! so a ban surfaced by either phase of a parallel account halts the whole
//! worker. Engagement is a compare-and-set on a set-once cell; the first
//! reason wins and the state is never cleared within a run.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Snapshot of an engaged standby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandbyState {
    pub reason: String,
    pub engaged_at: DateTime<Utc>,
}

/// Shared standby flag. Cheap to clone; all clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct StandbyController {
    state: Arc<OnceLock<StandbyState>>,
}

impl StandbyController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engage standby. Returns `true` only for the call that actually engaged it.
    pub fn engage(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let engaged = self
            .state
            .set(StandbyState {
                reason: reason.clone(),
                engaged_at: Utc::now(),
            })
            .is_ok();

        if engaged {
            warn!("Standby engaged: {}", reason);
        } else {
            info!("Standby already active, ignoring new reason: {}", reason);
        }
        engaged
    }

    pub fn is_active(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn reason(&self) -> Option<&str> {
        self.state.get().map(|s| s.reason.as_str())
    }

    pub fn state(&self) -> Option<&StandbyState> {
        self.state.get()
    }

    /// Whether two handles share the same underlying state.
    pub fn same_as(&self, other: &StandbyController) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Keep the process alive for manual review, logging a heartbeat every `interval`.
    ///
    /// Never returns; callers race it against a shutdown signal.
    pub async fn hold(&self, interval: Duration) {
        let reason = self.reason().unwrap_or("unknown").to_string();
        warn!(
            "Standby hold: sessions stay open for manual review ({})",
            reason
        );
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let since = self
                .state()
                .map(|s| s.engaged_at.to_rfc3339())
                .unwrap_or_default();
            info!("Standby active since {}: {}", since, reason);
        }
    }
}
