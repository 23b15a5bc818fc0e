//! Architecture-specific admission rules for disk claims and host readiness.
//!
//! Two architectures are supported, mutually exclusive per session:
//!
//! - **Mirrored** (cache/capacity split): each host needs exactly one flash
//!   cache disk and at least one HDD capacity disk.
//! - **Pooled** (all-flash): every claimed disk joins a single NVMe storage
//!   pool, at least two per host.
//!
//! Claim toggles are idempotent: re-claiming the same role reverts the disk
//! to Unclaimed. A claim that violates the active architecture's rule is
//! rejected with a descriptive error and no mutation occurs.

use crate::error::{ClusterLabError, Result};
use crate::topology::Topology;
use crate::types::{Architecture, DiskRole, HostStatus, MediaType, Scenario};
use tracing::debug;

/// Apply a claim toggle for a disk, enforcing the active architecture's
/// rules. Returns the role the disk ends up with.
pub fn claim_disk(
    topology: &mut Topology,
    architecture: Architecture,
    host_id: &str,
    disk_id: &str,
    role: DiskRole,
) -> Result<DiskRole> {
    let host = topology.host(host_id);

    if host.is_witness {
        return claim_witness_metadata(topology, host_id, role);
    }

    let disk = host
        .disk(disk_id)
        .unwrap_or_else(|| panic!("disk id not on host {}: {}", host_id, disk_id));

    // Idempotent toggle: claiming the current role reverts to Unclaimed.
    if disk.claimed_role == role {
        topology.set_disk_claim(host_id, disk_id, DiskRole::Unclaimed);
        debug!(host = host_id, disk = disk_id, "Claim reverted to Unclaimed");
        return Ok(DiskRole::Unclaimed);
    }

    let media = disk.media;
    match (architecture, role) {
        (Architecture::Mirrored, DiskRole::Cache) => {
            if !media.is_flash() {
                return Err(ClusterLabError::ClaimConflict(format!(
                    "disk {} is not flash media; the cache tier requires SSD or NVMe",
                    disk_id
                )));
            }
            let already_cached = host
                .disks
                .iter()
                .any(|d| d.id != disk_id && d.claimed_role == DiskRole::Cache);
            if already_cached {
                return Err(ClusterLabError::ClaimConflict(format!(
                    "host {} already has a cache disk assigned",
                    host.short_name()
                )));
            }
        }
        (Architecture::Mirrored, DiskRole::Capacity) => {
            if media != MediaType::Hdd {
                return Err(ClusterLabError::ClaimConflict(format!(
                    "disk {} must be claimed as Cache; only HDDs join the capacity tier",
                    disk_id
                )));
            }
        }
        (Architecture::Pooled, DiskRole::StoragePool) => {
            if media != MediaType::Nvme {
                return Err(ClusterLabError::ClaimConflict(format!(
                    "pooled architecture requires all-flash NVMe devices; disk {} is not compatible",
                    disk_id
                )));
            }
        }
        (_, requested) => {
            return Err(ClusterLabError::Validation(format!(
                "role {:?} is not valid for the {:?} architecture",
                requested, architecture
            )));
        }
    }

    topology.set_disk_claim(host_id, disk_id, role);
    debug!(host = host_id, disk = disk_id, ?role, "Disk claimed");
    Ok(role)
}

/// Witness appliances only hold quorum metadata: the Witness role toggles
/// every metadata disk at once, and no other role is accepted.
fn claim_witness_metadata(
    topology: &mut Topology,
    host_id: &str,
    role: DiskRole,
) -> Result<DiskRole> {
    if role != DiskRole::Witness {
        return Err(ClusterLabError::Validation(format!(
            "witness appliance {} only accepts the Witness metadata role",
            topology.host(host_id).short_name()
        )));
    }

    let currently_claimed = topology
        .host(host_id)
        .disks
        .iter()
        .any(|d| d.claimed_role == DiskRole::Witness);
    let new_role = if currently_claimed {
        DiskRole::Unclaimed
    } else {
        DiskRole::Witness
    };

    let disk_ids: Vec<String> = topology
        .host(host_id)
        .disks
        .iter()
        .map(|d| d.id.clone())
        .collect();
    for disk_id in disk_ids {
        topology.set_disk_claim(host_id, &disk_id, new_role);
    }
    Ok(new_role)
}

/// Check that every Connected host has its storage network traffic enabled.
pub fn services_ready(topology: &Topology) -> Result<()> {
    let unconfigured: Vec<&str> = topology
        .hosts()
        .iter()
        .filter(|h| h.status == HostStatus::Connected && !h.vsan_traffic_enabled)
        .map(|h| h.short_name())
        .collect();

    if unconfigured.is_empty() {
        Ok(())
    } else {
        Err(ClusterLabError::TrafficNotEnabled(unconfigured.join(", ")))
    }
}

/// Check that every Connected, traffic-enabled host satisfies the active
/// architecture's claim minimums, and that a two-node topology has its
/// witness metadata claimed.
pub fn disks_ready(
    topology: &Topology,
    scenario: Scenario,
    architecture: Architecture,
) -> Result<()> {
    if scenario == Scenario::TwoNodeWitness {
        if let Some(witness) = topology.witness() {
            if witness.status == HostStatus::Connected
                && !witness
                    .disks
                    .iter()
                    .any(|d| d.claimed_role == DiskRole::Witness)
            {
                return Err(ClusterLabError::Validation(
                    "the witness appliance metadata disk must be claimed".to_string(),
                ));
            }
        }
    }

    let invalid: Vec<&str> = topology
        .hosts()
        .iter()
        .filter(|h| {
            !h.is_witness && h.status == HostStatus::Connected && h.vsan_traffic_enabled
        })
        .filter(|h| match architecture {
            Architecture::Mirrored => {
                let cache = h
                    .disks
                    .iter()
                    .filter(|d| d.claimed_role == DiskRole::Cache)
                    .count();
                let capacity = h
                    .disks
                    .iter()
                    .filter(|d| d.claimed_role == DiskRole::Capacity)
                    .count();
                cache != 1 || capacity == 0
            }
            Architecture::Pooled => {
                h.disks
                    .iter()
                    .filter(|d| d.claimed_role == DiskRole::StoragePool)
                    .count()
                    < 2
            }
        })
        .map(|h| h.short_name())
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        let requirement = match architecture {
            Architecture::Mirrored => "exactly one cache disk and at least one capacity disk",
            Architecture::Pooled => "at least two storage-pool NVMe disks",
        };
        Err(ClusterLabError::Validation(format!(
            "hosts missing {}: {}",
            requirement,
            invalid.join(", ")
        )))
    }
}
