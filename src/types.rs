//! Core type definitions for the ClusterLab simulator.
//!
//! This module contains the fundamental data types used throughout
//! ClusterLab: hosts and their disks, virtual machines and their storage
//! components, storage policies, and the cluster-wide health snapshot.
//!
//! # Key Types
//!
//! - [`Host`]: a cluster member owning an ordered list of [`Disk`]s
//! - [`VirtualMachine`]: a placed VM with its [`VmComponent`] layout
//! - [`StoragePolicy`]: the five supported redundancy policies
//! - [`ClusterHealthSnapshot`]: cluster state plus resync progress
//!
//! # Examples
//!
//! ```rust
//! use clusterlab::types::StoragePolicy;
//!
//! // Mirrored FTT=1 doubles the logical size.
//! assert_eq!(StoragePolicy::Raid1Ftt1.consumed_space_gb(100), 200);
//!
//! // RAID-5 erasure coding carries a 1.33x multiplier, computed exactly.
//! assert_eq!(StoragePolicy::Raid5Ftt1.consumed_space_gb(300), 399);
//! ```

use serde::{Deserialize, Serialize};

/// Unique identifier for a host.
pub type HostId = String;

/// Unique identifier for a disk.
pub type DiskId = String;

/// Unique identifier for a virtual machine.
pub type VmId = String;

/// Disk media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Ssd,
    Hdd,
    Nvme,
}

impl MediaType {
    /// Flash media is eligible for cache and storage-pool roles.
    pub fn is_flash(&self) -> bool {
        matches!(self, MediaType::Ssd | MediaType::Nvme)
    }
}

/// Role a disk has been claimed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiskRole {
    Unclaimed,
    Cache,
    Capacity,
    StoragePool,
    Witness,
}

/// Disk health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskHealth {
    Healthy,
    Failed,
}

/// Host connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostStatus {
    /// Discovered but not part of the cluster.
    Unmanaged,
    Connected,
    Disconnected,
    Maintenance,
}

/// Network isolation status of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationStatus {
    Normal,
    Isolated,
}

/// Storage architecture for the session. The two are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Architecture {
    /// OSA-style: per-host cache disk (flash) plus capacity disks (HDD).
    Mirrored,
    /// ESA-style: a single all-NVMe storage pool per host.
    Pooled,
}

/// Deployment topology for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    /// Standard data-center cluster (seven data hosts).
    Standard,
    /// Two data hosts plus a dedicated witness appliance (ROBO).
    TwoNodeWitness,
}

/// VM power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    /// Transitional state during an HA restart; observable by consumers
    /// polling mid-relocation.
    Booting,
}

/// Whether a VM's storage currently satisfies its policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compliance {
    Compliant,
    NonCompliant,
}

/// Kind of a VM storage component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentKind {
    VmHome,
    DataReplica,
    Witness,
}

/// Status of a VM storage component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentStatus {
    Active,
    Absent,
    Stale,
}

/// Cluster-wide health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterState {
    Healthy,
    Warning,
    Critical,
    Resyncing,
}

impl ClusterState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ClusterState::Healthy)
    }
}

/// Snapshot of the cluster health singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHealthSnapshot {
    pub state: ClusterState,
    /// Reconstruction progress, meaningful only while `state` is Resyncing.
    pub resync_progress: u8,
}

/// Redundancy encoding of a storage policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    Mirror,
    ErasureCoded,
}

/// The five supported storage policies. Policies are immutable configuration
/// values, not mutable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoragePolicy {
    Raid1Ftt1,
    Raid5Ftt1,
    Raid1Ftt2,
    Raid6Ftt2,
    Raid1Ftt3,
}

impl StoragePolicy {
    /// Number of concurrent failures the policy tolerates.
    pub fn ftt(&self) -> u8 {
        match self {
            StoragePolicy::Raid1Ftt1 | StoragePolicy::Raid5Ftt1 => 1,
            StoragePolicy::Raid1Ftt2 | StoragePolicy::Raid6Ftt2 => 2,
            StoragePolicy::Raid1Ftt3 => 3,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            StoragePolicy::Raid1Ftt1 | StoragePolicy::Raid1Ftt2 | StoragePolicy::Raid1Ftt3 => {
                Encoding::Mirror
            }
            StoragePolicy::Raid5Ftt1 | StoragePolicy::Raid6Ftt2 => Encoding::ErasureCoded,
        }
    }

    /// Minimum host count the policy can be laid out across.
    pub fn min_hosts(&self) -> usize {
        match self {
            StoragePolicy::Raid1Ftt1 => 3,
            StoragePolicy::Raid5Ftt1 => 4,
            StoragePolicy::Raid1Ftt2 => 5,
            StoragePolicy::Raid6Ftt2 => 6,
            StoragePolicy::Raid1Ftt3 => 7,
        }
    }

    /// Space-consumption multiplier as an exact rational (numerator,
    /// denominator). Mirrored policies consume FTT+1 full copies; erasure
    /// coded policies carry parity overhead.
    fn multiplier_ratio(&self) -> (u64, u64) {
        match self {
            StoragePolicy::Raid1Ftt1 => (2, 1),
            StoragePolicy::Raid5Ftt1 => (133, 100),
            StoragePolicy::Raid1Ftt2 => (3, 1),
            StoragePolicy::Raid6Ftt2 => (150, 100),
            StoragePolicy::Raid1Ftt3 => (4, 1),
        }
    }

    /// Space-consumption multiplier for display purposes.
    pub fn multiplier(&self) -> f64 {
        let (num, den) = self.multiplier_ratio();
        num as f64 / den as f64
    }

    /// Derived consumed space: `ceil(logical x multiplier)`, computed with
    /// integer arithmetic so 300 GB under RAID-5 is exactly 399.
    pub fn consumed_space_gb(&self, logical_size_gb: u64) -> u64 {
        let (num, den) = self.multiplier_ratio();
        (logical_size_gb * num + den - 1) / den
    }

    /// All supported policies, in selection order.
    pub fn all() -> [StoragePolicy; 5] {
        [
            StoragePolicy::Raid1Ftt1,
            StoragePolicy::Raid5Ftt1,
            StoragePolicy::Raid1Ftt2,
            StoragePolicy::Raid6Ftt2,
            StoragePolicy::Raid1Ftt3,
        ]
    }
}

impl std::fmt::Display for StoragePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoragePolicy::Raid1Ftt1 => "RAID-1 (FTT=1)",
            StoragePolicy::Raid5Ftt1 => "RAID-5 (FTT=1)",
            StoragePolicy::Raid1Ftt2 => "RAID-1 (FTT=2)",
            StoragePolicy::Raid6Ftt2 => "RAID-6 (FTT=2)",
            StoragePolicy::Raid1Ftt3 => "RAID-1 (FTT=3)",
        };
        write!(f, "{}", name)
    }
}

/// A physical disk, owned exclusively by one host for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disk {
    pub id: DiskId,
    pub media: MediaType,
    pub capacity_gb: u64,
    pub claimed_role: DiskRole,
    pub health: DiskHealth,
}

impl Disk {
    pub fn new(id: impl Into<DiskId>, media: MediaType, capacity_gb: u64) -> Self {
        Self {
            id: id.into(),
            media,
            capacity_gb,
            claimed_role: DiskRole::Unclaimed,
            health: DiskHealth::Healthy,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed_role != DiskRole::Unclaimed
    }
}

/// A host in the simulated cluster. Hosts are created at scenario selection
/// and never deleted, only detached back to Unmanaged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub address: String,
    pub version: String,
    pub is_witness: bool,
    pub status: HostStatus,
    pub isolation: IsolationStatus,
    pub vsan_traffic_enabled: bool,
    pub disks: Vec<Disk>,
}

impl Host {
    /// Connected and reachable over the storage network.
    pub fn is_active(&self) -> bool {
        self.status == HostStatus::Connected && self.isolation == IsolationStatus::Normal
    }

    /// Eligible to hold VM compute: active, configured, non-witness.
    pub fn is_compute_eligible(&self) -> bool {
        self.is_active() && self.vsan_traffic_enabled && !self.is_witness
    }

    pub fn has_claimed_disk(&self) -> bool {
        self.disks.iter().any(Disk::is_claimed)
    }

    pub fn disk(&self, disk_id: &str) -> Option<&Disk> {
        self.disks.iter().find(|d| d.id == disk_id)
    }

    pub fn disk_mut(&mut self, disk_id: &str) -> Option<&mut Disk> {
        self.disks.iter_mut().find(|d| d.id == disk_id)
    }

    /// Short display name (hostname up to the first dot).
    pub fn short_name(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }
}

/// A storage component of a VM object. Generated once at VM creation by the
/// placement engine; only `host_id` and `status` mutate afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmComponent {
    pub id: String,
    pub kind: ComponentKind,
    pub host_id: HostId,
    pub status: ComponentStatus,
}

impl VmComponent {
    pub fn new(id: impl Into<String>, kind: ComponentKind, host_id: impl Into<HostId>) -> Self {
        Self {
            id: id.into(),
            kind,
            host_id: host_id.into(),
            status: ComponentStatus::Active,
        }
    }
}

/// A virtual machine. Created in bulk by deploy; never deleted in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub id: VmId,
    pub name: String,
    /// Current compute placement.
    pub host_id: HostId,
    pub power: PowerState,
    pub compliance: Compliance,
    pub policy: StoragePolicy,
    pub logical_size_gb: u64,
    pub consumed_space_gb: u64,
    pub components: Vec<VmComponent>,
}

impl VirtualMachine {
    /// Whether any storage component of this VM lives on the given host.
    pub fn has_component_on(&self, host_id: &str) -> bool {
        self.components.iter().any(|c| c.host_id == host_id)
    }
}

/// Kind of fault to inject or recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    Host,
    Disk,
    Network,
}

/// Maintenance-mode entry option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceMode {
    /// Compute-only evacuation; data stays put with reduced redundancy.
    EnsureAccessibility,
    /// Full data copy-out before the host is parked.
    FullDataEvacuation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumed_space_mirror() {
        assert_eq!(StoragePolicy::Raid1Ftt1.consumed_space_gb(100), 200);
        assert_eq!(StoragePolicy::Raid1Ftt2.consumed_space_gb(100), 300);
        assert_eq!(StoragePolicy::Raid1Ftt3.consumed_space_gb(50), 200);
    }

    #[test]
    fn test_consumed_space_erasure_exact() {
        // 300 x 1.33 must be exactly 399, not a float-rounded 400.
        assert_eq!(StoragePolicy::Raid5Ftt1.consumed_space_gb(300), 399);
        assert_eq!(StoragePolicy::Raid6Ftt2.consumed_space_gb(100), 150);
        // Non-divisible sizes round up.
        assert_eq!(StoragePolicy::Raid5Ftt1.consumed_space_gb(50), 67);
    }

    #[test]
    fn test_policy_attributes() {
        assert_eq!(StoragePolicy::Raid1Ftt3.ftt(), 3);
        assert_eq!(StoragePolicy::Raid1Ftt3.min_hosts(), 7);
        assert_eq!(StoragePolicy::Raid5Ftt1.encoding(), Encoding::ErasureCoded);
        assert_eq!(StoragePolicy::Raid1Ftt1.encoding(), Encoding::Mirror);
    }

    #[test]
    fn test_power_state_serializes_all_variants() {
        for power in [
            PowerState::PoweredOn,
            PowerState::PoweredOff,
            PowerState::Booting,
        ] {
            let json = serde_json::to_string(&power).unwrap();
            let back: PowerState = serde_json::from_str(&json).unwrap();
            assert_eq!(back, power);
        }
    }

    #[test]
    fn test_host_short_name() {
        let host = Host {
            id: "h1".into(),
            name: "esxi01.lab.local".into(),
            address: "192.168.10.11".into(),
            version: "8.0 U2".into(),
            is_witness: false,
            status: HostStatus::Connected,
            isolation: IsolationStatus::Normal,
            vsan_traffic_enabled: true,
            disks: vec![],
        };
        assert_eq!(host.short_name(), "esxi01");
        assert!(host.is_active());
        assert!(host.is_compute_eligible());
    }
}
