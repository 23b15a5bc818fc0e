//! Canonical topology model: hosts, disks, and their claim state.
//!
//! The topology owns every [`Host`] in discovery order. All mutation is
//! routed through the primitives here; ids are never exposed to untrusted
//! input beyond validated entities, so operating on a nonexistent id is a
//! programming error and panics rather than returning a recoverable failure.

use crate::types::{
    Architecture, Disk, DiskHealth, DiskRole, Host, HostStatus, IsolationStatus, MediaType,
    Scenario,
};
use tracing::debug;

/// Arena of hosts, keyed by stable id, iterated in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    hosts: Vec<Host>,
}

impl Topology {
    /// Seed the fleet for a scenario/architecture combination. All hosts
    /// start Unmanaged with unclaimed, healthy disks.
    pub fn seed(scenario: Scenario, architecture: Architecture, version: &str) -> Self {
        let hosts = match scenario {
            Scenario::Standard => standard_fleet(architecture, version),
            Scenario::TwoNodeWitness => two_node_fleet(architecture, version),
        };
        debug!(hosts = hosts.len(), ?scenario, ?architecture, "Seeded fleet");
        Self { hosts }
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn contains(&self, host_id: &str) -> bool {
        self.hosts.iter().any(|h| h.id == host_id)
    }

    /// Look up a host. Panics on an unknown id (programming error).
    pub fn host(&self, host_id: &str) -> &Host {
        self.hosts
            .iter()
            .find(|h| h.id == host_id)
            .unwrap_or_else(|| panic!("host id not in topology: {}", host_id))
    }

    pub(crate) fn host_mut(&mut self, host_id: &str) -> &mut Host {
        self.hosts
            .iter_mut()
            .find(|h| h.id == host_id)
            .unwrap_or_else(|| panic!("host id not in topology: {}", host_id))
    }

    /// The host owning the given disk, if any.
    pub fn disk_owner(&self, disk_id: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.disk(disk_id).is_some())
    }

    /// Admit a host to the cluster.
    pub fn join(&mut self, host_id: &str) {
        let host = self.host_mut(host_id);
        host.status = HostStatus::Connected;
        debug!(host = host_id, "Host joined cluster");
    }

    /// Detach a host back to Unmanaged, resetting its configuration. Hosts
    /// are never deleted within a session.
    pub fn leave(&mut self, host_id: &str) {
        let host = self.host_mut(host_id);
        host.status = HostStatus::Unmanaged;
        host.isolation = IsolationStatus::Normal;
        host.vsan_traffic_enabled = false;
        for disk in &mut host.disks {
            disk.claimed_role = DiskRole::Unclaimed;
            disk.health = DiskHealth::Healthy;
        }
        debug!(host = host_id, "Host detached from cluster");
    }

    pub fn set_host_status(&mut self, host_id: &str, status: HostStatus) {
        self.host_mut(host_id).status = status;
    }

    pub fn set_isolation(&mut self, host_id: &str, isolation: IsolationStatus) {
        self.host_mut(host_id).isolation = isolation;
    }

    pub fn set_traffic_enabled(&mut self, host_id: &str, enabled: bool) {
        self.host_mut(host_id).vsan_traffic_enabled = enabled;
    }

    pub fn set_version(&mut self, host_id: &str, version: &str) {
        self.host_mut(host_id).version = version.to_string();
    }

    pub fn set_disk_claim(&mut self, host_id: &str, disk_id: &str, role: DiskRole) {
        let host = self.host_mut(host_id);
        let disk = host
            .disk_mut(disk_id)
            .unwrap_or_else(|| panic!("disk id not on host {}: {}", host_id, disk_id));
        disk.claimed_role = role;
    }

    pub fn set_disk_health(&mut self, host_id: &str, disk_id: &str, health: DiskHealth) {
        let host = self.host_mut(host_id);
        let disk = host
            .disk_mut(disk_id)
            .unwrap_or_else(|| panic!("disk id not on host {}: {}", host_id, disk_id));
        disk.health = health;
    }

    /// The dedicated witness host, if the topology defines one.
    pub fn witness(&self) -> Option<&Host> {
        self.hosts.iter().find(|h| h.is_witness)
    }

    /// Connected non-witness hosts, in discovery order.
    pub fn connected_data_hosts(&self) -> Vec<&Host> {
        self.hosts
            .iter()
            .filter(|h| h.status == HostStatus::Connected && !h.is_witness)
            .collect()
    }

    /// Hosts eligible to run VM compute and take part in placement:
    /// Connected, traffic-enabled, in discovery order (witness included for
    /// layout purposes when connected and configured).
    pub fn active_hosts(&self) -> Vec<&Host> {
        self.hosts
            .iter()
            .filter(|h| h.status == HostStatus::Connected && h.vsan_traffic_enabled)
            .collect()
    }

    /// Count of hosts currently consuming the failure-tolerance budget:
    /// Disconnected, network-isolated, or parked in Maintenance.
    pub fn disrupted_count(&self) -> usize {
        self.hosts
            .iter()
            .filter(|h| {
                h.status == HostStatus::Disconnected
                    || h.status == HostStatus::Maintenance
                    || h.isolation == IsolationStatus::Isolated
            })
            .count()
    }
}

fn make_host(
    id: &str,
    name: String,
    address: String,
    version: &str,
    is_witness: bool,
    disks: Vec<Disk>,
) -> Host {
    Host {
        id: id.to_string(),
        name,
        address,
        version: version.to_string(),
        is_witness,
        status: HostStatus::Unmanaged,
        isolation: IsolationStatus::Normal,
        vsan_traffic_enabled: false,
        disks,
    }
}

fn standard_fleet(architecture: Architecture, version: &str) -> Vec<Host> {
    (1..=7)
        .map(|i| {
            let disks = match architecture {
                Architecture::Pooled => vec![
                    Disk::new(format!("nvme.500{}1", i), MediaType::Nvme, 1920),
                    Disk::new(format!("nvme.500{}2", i), MediaType::Nvme, 1920),
                    Disk::new(format!("nvme.500{}3", i), MediaType::Nvme, 1920),
                ],
                Architecture::Mirrored => vec![
                    Disk::new(format!("naa.500{}", i), MediaType::Ssd, 800),
                    Disk::new(format!("naa.600{}1", i), MediaType::Hdd, 4000),
                    Disk::new(format!("naa.600{}2", i), MediaType::Hdd, 4000),
                ],
            };
            make_host(
                &format!("h{}", i),
                format!("esxi0{}.clusterlab.local", i),
                format!("192.168.10.{}", 10 + i),
                version,
                false,
                disks,
            )
        })
        .collect()
}

fn two_node_fleet(architecture: Architecture, version: &str) -> Vec<Host> {
    let mut hosts: Vec<Host> = (1..=2)
        .map(|i| {
            let disks = match architecture {
                Architecture::Pooled => vec![
                    Disk::new(format!("nvme.500{}1", i), MediaType::Nvme, 3840),
                    Disk::new(format!("nvme.500{}2", i), MediaType::Nvme, 3840),
                ],
                Architecture::Mirrored => vec![
                    Disk::new(format!("naa.500{}", i), MediaType::Ssd, 400),
                    Disk::new(format!("naa.600{}1", i), MediaType::Hdd, 1920),
                    Disk::new(format!("naa.600{}2", i), MediaType::Hdd, 1920),
                ],
            };
            make_host(
                &format!("h{}", i),
                format!("esxi0{}-robo.clusterlab.local", i),
                format!("10.10.10.{}", 10 + i),
                version,
                false,
                disks,
            )
        })
        .collect();

    // Witness appliance: quorum metadata only, contributes no capacity.
    hosts.push(make_host(
        "witness",
        "vsan-witness-01.clusterlab.local".to_string(),
        "172.16.20.5".to_string(),
        version,
        true,
        vec![Disk::new("wit.meta.1", MediaType::Ssd, 0)],
    ));
    hosts
}
