//! Error types for the ClusterLab simulator.
//!
//! This module provides a unified error type [`ClusterLabError`] for all
//! simulator operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Validation errors**: user-facing, recoverable, never mutate state
//!   (insufficient hosts, disk-role conflicts, missing VMkernel config).
//! - **Admission rejections**: the request is legal input but currently
//!   inadmissible (FTT budget exceeded, a resync already running, an
//!   evacuation in progress). State is unchanged.
//! - **Programming errors**: unknown entity ids or invalid configuration
//!   handed in by the embedding layer.
//!
//! # Example
//!
//! ```rust
//! use clusterlab::error::{ClusterLabError, Result};
//!
//! fn check_host_count(selected: usize) -> Result<()> {
//!     if selected < 3 {
//!         return Err(ClusterLabError::InsufficientHosts { have: selected, need: 3 });
//!     }
//!     Ok(())
//! }
//!
//! let err = check_host_count(2).unwrap_err();
//! assert!(err.is_validation());
//! ```

use thiserror::Error;

/// Main error type for ClusterLab operations.
#[derive(Error, Debug)]
pub enum ClusterLabError {
    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient hosts: have {have}, need {need}")]
    InsufficientHosts { have: usize, need: usize },

    #[error("Disk claim conflict: {0}")]
    ClaimConflict(String),

    #[error("vSAN traffic not enabled on: {0}")]
    TrafficNotEnabled(String),

    #[error("Placement failed: {0}")]
    PlacementFailed(String),

    // Admission-guard rejections
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Failure would exceed FTT budget: {disrupted} disrupted, FTT={ftt}")]
    FttExceeded { disrupted: usize, ftt: u8 },

    #[error("Resync already in progress")]
    ResyncInProgress,

    #[error("Maintenance evacuation already in progress on host {0}")]
    MaintenanceInProgress(String),

    // Programming errors
    #[error("Host not found: {0}")]
    HostNotFound(String),

    #[error("Disk not found: {0}")]
    DiskNotFound(String),

    #[error("VM not found: {0}")]
    VmNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Configuration errors
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClusterLabError {
    /// Check whether this is a user-facing validation error.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ClusterLabError::Validation(_)
                | ClusterLabError::InsufficientHosts { .. }
                | ClusterLabError::ClaimConflict(_)
                | ClusterLabError::TrafficNotEnabled(_)
                | ClusterLabError::PlacementFailed(_)
        )
    }

    /// Check whether this is an admission-guard rejection: the command was
    /// well-formed but currently inadmissible. Retrying later may succeed.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ClusterLabError::Rejected(_)
                | ClusterLabError::FttExceeded { .. }
                | ClusterLabError::ResyncInProgress
                | ClusterLabError::MaintenanceInProgress(_)
        )
    }
}

impl From<serde_json::Error> for ClusterLabError {
    fn from(e: serde_json::Error) -> Self {
        ClusterLabError::Internal(e.to_string())
    }
}

/// Result type alias for ClusterLab operations.
pub type Result<T> = std::result::Result<T, ClusterLabError>;
