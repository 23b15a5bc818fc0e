//! Capacity ledger: raw and consumed capacity, recomputed on demand.

use crate::types::{DiskRole, Host, HostStatus, VirtualMachine};

/// Total raw datastore capacity in GB: capacity/storage-pool disks on
/// Connected or Maintenance non-witness hosts.
pub fn total_raw_gb(hosts: &[Host]) -> u64 {
    hosts
        .iter()
        .filter(|h| {
            !h.is_witness
                && matches!(h.status, HostStatus::Connected | HostStatus::Maintenance)
        })
        .flat_map(|h| h.disks.iter())
        .filter(|d| matches!(d.claimed_role, DiskRole::Capacity | DiskRole::StoragePool))
        .map(|d| d.capacity_gb)
        .sum()
}

/// Total consumed space in GB across all VMs.
pub fn total_consumed_gb(vms: &[VirtualMachine]) -> u64 {
    vms.iter().map(|vm| vm.consumed_space_gb).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;
    use crate::types::{Architecture, Compliance, PowerState, Scenario, StoragePolicy};

    fn make_vm(id: &str, size: u64, policy: StoragePolicy) -> VirtualMachine {
        VirtualMachine {
            id: id.into(),
            name: format!("App-Server-{}", id),
            host_id: "h1".into(),
            power: PowerState::PoweredOn,
            compliance: Compliance::Compliant,
            policy,
            logical_size_gb: size,
            consumed_space_gb: policy.consumed_space_gb(size),
            components: vec![],
        }
    }

    #[test]
    fn test_raw_capacity_counts_only_claimed_disks() {
        let mut topo = Topology::seed(Scenario::Standard, Architecture::Mirrored, "8.0 U2");
        topo.join("h1");
        assert_eq!(total_raw_gb(topo.hosts()), 0);

        topo.set_disk_claim("h1", "naa.60011", DiskRole::Capacity);
        assert_eq!(total_raw_gb(topo.hosts()), 4000);

        // Cache disks never contribute to raw capacity.
        topo.set_disk_claim("h1", "naa.5001", DiskRole::Cache);
        assert_eq!(total_raw_gb(topo.hosts()), 4000);
    }

    #[test]
    fn test_raw_capacity_skips_unmanaged_and_witness() {
        let mut topo = Topology::seed(Scenario::TwoNodeWitness, Architecture::Mirrored, "8.0 U2");
        topo.set_disk_claim("h1", "naa.60011", DiskRole::Capacity);
        // h1 is still Unmanaged: nothing counts.
        assert_eq!(total_raw_gb(topo.hosts()), 0);

        topo.join("h1");
        assert_eq!(total_raw_gb(topo.hosts()), 1920);

        // Maintenance hosts still count.
        topo.set_host_status("h1", crate::types::HostStatus::Maintenance);
        assert_eq!(total_raw_gb(topo.hosts()), 1920);
    }

    #[test]
    fn test_consumed_sums_vm_usage() {
        let vms = vec![
            make_vm("vm1", 100, StoragePolicy::Raid1Ftt1),
            make_vm("vm2", 300, StoragePolicy::Raid5Ftt1),
        ];
        assert_eq!(total_consumed_gb(&vms), 200 + 399);
    }
}
