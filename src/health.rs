//! Cluster-wide health state machine.
//!
//! Four states: Healthy, Warning, Critical, Resyncing. Warning and Critical
//! are terminal with respect to automatic transitions; only an explicit
//! recovery moves the cluster out of them, via the single-flight resync
//! progression tracked here.

use crate::error::{ClusterLabError, Result};
use crate::types::{ClusterHealthSnapshot, ClusterState};
use tracing::debug;

/// Resync advances in fixed 10-point increments.
pub const RESYNC_STEP: u8 = 10;

/// Process-wide health singleton, owned by the simulator.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    state: ClusterState,
    resync_progress: u8,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            state: ClusterState::Healthy,
            resync_progress: 0,
        }
    }

    pub fn state(&self) -> ClusterState {
        self.state
    }

    pub fn is_resyncing(&self) -> bool {
        self.state == ClusterState::Resyncing
    }

    pub fn snapshot(&self) -> ClusterHealthSnapshot {
        ClusterHealthSnapshot {
            state: self.state,
            resync_progress: self.resync_progress,
        }
    }

    /// A failure consumed more tolerance than the policy budget allows, or a
    /// whole disk group was lost.
    pub fn mark_critical(&mut self) {
        debug!(from = ?self.state, "Cluster health -> Critical");
        self.state = ClusterState::Critical;
    }

    /// Localized degradation: redundancy reduced without breaking quorum.
    pub fn mark_warning(&mut self) {
        debug!(from = ?self.state, "Cluster health -> Warning");
        self.state = ClusterState::Warning;
    }

    /// Admit a new resync. Only one may run at a time; concurrent requests
    /// are rejected, not queued.
    pub fn begin_resync(&mut self) -> Result<()> {
        if self.is_resyncing() {
            return Err(ClusterLabError::ResyncInProgress);
        }
        debug!(from = ?self.state, "Cluster health -> Resyncing");
        self.state = ClusterState::Resyncing;
        self.resync_progress = 0;
        Ok(())
    }

    /// Advance the running resync by one step. Returns the new progress;
    /// reaching 100 automatically lands the cluster back in Healthy.
    pub fn advance_resync(&mut self) -> u8 {
        debug_assert!(self.is_resyncing(), "advance_resync outside a resync");
        self.resync_progress = (self.resync_progress + RESYNC_STEP).min(100);
        if self.resync_progress == 100 {
            debug!("Resync complete, cluster health -> Healthy");
            self.state = ClusterState::Healthy;
        }
        self.resync_progress
    }

    /// Full reset to the initial Healthy state.
    pub fn reset(&mut self) {
        self.state = ClusterState::Healthy;
        self.resync_progress = 0;
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}
