//! Configuration module for ClusterLab.

use crate::error::{ClusterLabError, Result};
use crate::observability::ObservabilityConfig;
use crate::types::{Architecture, Scenario};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for a ClusterLab session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterLabConfig {
    /// Cluster display name.
    pub cluster_name: String,
    /// Deployment topology.
    pub scenario: Scenario,
    /// Storage architecture for the session.
    pub architecture: Architecture,
    /// Software version hosts start at.
    pub initial_version: String,
    /// Software version the upgrade workflow installs.
    pub target_version: String,
    /// Number of test VMs a deploy operation creates.
    pub vm_count: usize,
    /// Logical sizes (GB) assigned to deployed VMs, cycled in order.
    pub vm_sizes_gb: Vec<u64>,
    /// Workflow timing.
    pub timing: TimingConfig,
    /// Logging setup for embedding applications.
    pub observability: ObservabilityConfig,
}

impl Default for ClusterLabConfig {
    fn default() -> Self {
        Self {
            cluster_name: "ClusterLab".to_string(),
            scenario: Scenario::Standard,
            architecture: Architecture::Mirrored,
            initial_version: "8.0 U2".to_string(),
            target_version: "8.0 U3".to_string(),
            vm_count: 12,
            vm_sizes_gb: vec![50, 50, 100, 100, 200, 200, 500, 500, 100, 200, 50, 500],
            timing: TimingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ClusterLabConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ClusterLabError::InvalidConfig {
            field: "file".to_string(),
            reason: format!("failed to read config file: {}", e),
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ClusterLabError::InvalidConfig {
                field: "file".to_string(),
                reason: format!("failed to parse config: {}", e),
            }
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.is_empty() {
            return Err(ClusterLabError::InvalidConfig {
                field: "cluster_name".to_string(),
                reason: "cluster name must not be empty".to_string(),
            });
        }

        if self.vm_count == 0 {
            return Err(ClusterLabError::InvalidConfig {
                field: "vm_count".to_string(),
                reason: "at least one VM must be deployed".to_string(),
            });
        }

        if self.vm_sizes_gb.is_empty() {
            return Err(ClusterLabError::InvalidConfig {
                field: "vm_sizes_gb".to_string(),
                reason: "VM size list must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Configuration with all workflow delays zeroed, for tests and
    /// non-interactive runs.
    pub fn development() -> Self {
        Self {
            timing: TimingConfig {
                resync_step: Duration::ZERO,
                evacuation_step: Duration::ZERO,
                upgrade_step: Duration::ZERO,
                migration_settle: Duration::ZERO,
                rebalance_delay: Duration::ZERO,
            },
            ..Self::default()
        }
    }
}

/// Simulated delays for the step-wise workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Delay between resync progress steps (10-point increments).
    #[serde(with = "humantime_serde")]
    pub resync_step: Duration,
    /// Delay between full-data-evacuation steps (20-point increments).
    #[serde(with = "humantime_serde")]
    pub evacuation_step: Duration,
    /// Delay between upgrade steps (10-point increments).
    #[serde(with = "humantime_serde")]
    pub upgrade_step: Duration,
    /// Settle delay after each simulated live migration.
    #[serde(with = "humantime_serde")]
    pub migration_settle: Duration,
    /// Delay before a scheduled rebalance pass runs.
    #[serde(with = "humantime_serde")]
    pub rebalance_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            resync_step: Duration::from_millis(400),
            evacuation_step: Duration::from_millis(500),
            upgrade_step: Duration::from_millis(300),
            migration_settle: Duration::from_millis(500),
            rebalance_delay: Duration::from_secs(3),
        }
    }
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        } else if let Some(s_val) = s.strip_suffix('s') {
            s_val
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string())
        } else if let Some(m) = s.strip_suffix('m') {
            m.parse::<u64>()
                .map(|v| Duration::from_secs(v * 60))
                .map_err(|e| e.to_string())
        } else {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        }
    }
}
