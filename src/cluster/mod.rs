//! Cluster operations for ClusterLab.
//!
//! This module holds the cluster-wide machinery:
//! - Placement engine for VM component layout
//! - Failure injection and its effect rules
//! - Recovery and resynchronization
//! - DRS-style load balancing
//! - Maintenance mode and host upgrades

mod balancer;
mod failure;
mod maintenance;
mod placement;
mod recovery;

pub use balancer::{BalanceStats, LoadBalancer, MoveOperation};
pub use failure::FailureOrchestrator;
pub use maintenance::MaintenanceManager;
pub use placement::PlacementEngine;
pub use recovery::RecoveryManager;

use crate::types::{ClusterState, HostStatus};

/// Point-in-time cluster summary for dashboards and status commands.
#[derive(Debug, Clone)]
pub struct ClusterStatus {
    /// Number of connected data hosts.
    pub connected_hosts: usize,
    /// Number of disconnected data hosts.
    pub disconnected_hosts: usize,
    /// Hosts parked in maintenance mode.
    pub maintenance_hosts: usize,
    /// Total raw datastore capacity in GB.
    pub raw_capacity_gb: u64,
    /// Capacity consumed by VM objects in GB.
    pub consumed_gb: u64,
    /// Deployed virtual machines.
    pub vm_count: usize,
    /// Cluster health state.
    pub health: ClusterState,
    /// Resync progress, 0 unless the cluster is resyncing.
    pub resync_progress: u8,
}

impl ClusterStatus {
    pub fn gather(
        topology: &crate::topology::Topology,
        vms: &[crate::types::VirtualMachine],
        health: &crate::health::HealthMonitor,
    ) -> Self {
        let data_hosts = topology.hosts().iter().filter(|h| !h.is_witness);
        let mut connected = 0;
        let mut disconnected = 0;
        let mut maintenance = 0;
        for host in data_hosts {
            match host.status {
                HostStatus::Connected => connected += 1,
                HostStatus::Disconnected => disconnected += 1,
                HostStatus::Maintenance => maintenance += 1,
                HostStatus::Unmanaged => {}
            }
        }
        let snapshot = health.snapshot();
        Self {
            connected_hosts: connected,
            disconnected_hosts: disconnected,
            maintenance_hosts: maintenance,
            raw_capacity_gb: crate::capacity::total_raw_gb(topology.hosts()),
            consumed_gb: crate::capacity::total_consumed_gb(vms),
            vm_count: vms.len(),
            health: snapshot.state,
            resync_progress: snapshot.resync_progress,
        }
    }
}
