//! Failure injection: host faults, network partitions, disk failures.
//!
//! Each fault kind has an admission rule (checked against the active
//! policy's failure-tolerance budget) and an effect rule. Admission
//! rejections leave all state untouched.

use crate::error::{ClusterLabError, Result};
use crate::events::EventLog;
use crate::health::HealthMonitor;
use crate::topology::Topology;
use crate::types::{
    Architecture, Compliance, ComponentStatus, DiskHealth, DiskRole, FaultKind, HostStatus,
    IsolationStatus, PowerState, Scenario, StoragePolicy, VirtualMachine,
};
use tracing::{info, warn};

/// Injects faults and applies their cluster-wide effects.
#[derive(Debug, Clone, Copy)]
pub struct FailureOrchestrator {
    scenario: Scenario,
    architecture: Architecture,
}

impl FailureOrchestrator {
    pub fn new(scenario: Scenario, architecture: Architecture) -> Self {
        Self {
            scenario,
            architecture,
        }
    }

    /// Inject a fault against the given target id.
    pub fn inject(
        &self,
        kind: FaultKind,
        target: &str,
        policy: StoragePolicy,
        topology: &mut Topology,
        vms: &mut [VirtualMachine],
        health: &mut HealthMonitor,
        events: &EventLog,
    ) -> Result<()> {
        match kind {
            FaultKind::Host => self.inject_host_fault(target, policy, false, topology, vms, health, events),
            FaultKind::Network => self.inject_host_fault(target, policy, true, topology, vms, health, events),
            FaultKind::Disk => self.inject_disk_fault(target, topology, vms, health, events),
        }
    }

    /// Admission guard for host-level failures: a new failure may not push
    /// the count of tolerance-consuming events past the policy budget. The
    /// two-node topology instead requires the other data host to stay
    /// reachable.
    fn admit_host_fault(
        &self,
        target: &str,
        policy: StoragePolicy,
        topology: &Topology,
    ) -> Result<()> {
        if self.scenario == Scenario::TwoNodeWitness {
            let survivor_reachable = topology
                .hosts()
                .iter()
                .any(|h| !h.is_witness && h.id != target && h.status == HostStatus::Connected);
            if !survivor_reachable {
                return Err(ClusterLabError::Rejected(
                    "at least one data host must remain reachable".to_string(),
                ));
            }
            return Ok(());
        }

        let disrupted = topology.disrupted_count();
        if disrupted + 1 > policy.ftt() as usize {
            return Err(ClusterLabError::FttExceeded {
                disrupted,
                ftt: policy.ftt(),
            });
        }
        Ok(())
    }

    fn inject_host_fault(
        &self,
        host_id: &str,
        policy: StoragePolicy,
        partition: bool,
        topology: &mut Topology,
        vms: &mut [VirtualMachine],
        health: &mut HealthMonitor,
        events: &EventLog,
    ) -> Result<()> {
        if !topology.contains(host_id) {
            return Err(ClusterLabError::HostNotFound(host_id.to_string()));
        }
        if topology.host(host_id).status != HostStatus::Connected {
            return Err(ClusterLabError::Rejected(format!(
                "host {} is not connected",
                topology.host(host_id).short_name()
            )));
        }
        self.admit_host_fault(host_id, policy, topology)?;

        let host_name = topology.host(host_id).short_name().to_string();
        let survivors: Vec<String> = topology
            .connected_data_hosts()
            .iter()
            .filter(|h| h.id != host_id)
            .map(|h| h.id.clone())
            .collect();

        topology.set_host_status(host_id, HostStatus::Disconnected);
        if partition {
            topology.set_isolation(host_id, IsolationStatus::Isolated);
            events.error(format!(
                "Network partition: host {} lost storage quorum (network isolation). Cluster state: CRITICAL.",
                host_name
            ));
        } else {
            events.error(format!(
                "Host failure: {} lost connectivity. Cluster state: CRITICAL.",
                host_name
            ));
        }
        health.mark_critical();

        restart_vms_from(host_id, &survivors, topology, vms, events);
        events.info("Rebuilding storage components of affected VMs.");
        warn!(host = host_id, partition, "Host-level fault injected");
        Ok(())
    }

    fn inject_disk_fault(
        &self,
        disk_id: &str,
        topology: &mut Topology,
        vms: &mut [VirtualMachine],
        health: &mut HealthMonitor,
        events: &EventLog,
    ) -> Result<()> {
        let Some(owner) = topology.disk_owner(disk_id) else {
            return Err(ClusterLabError::DiskNotFound(disk_id.to_string()));
        };
        let host_id = owner.id.clone();
        let host_name = owner.short_name().to_string();
        let disk = owner
            .disk(disk_id)
            .expect("owner host must hold the disk");
        let role = disk.claimed_role;

        if disk.health != DiskHealth::Healthy || owner.status != HostStatus::Connected {
            return Err(ClusterLabError::Rejected(format!(
                "disk {} is already failed or its host is disconnected",
                disk_id
            )));
        }
        if role == DiskRole::Unclaimed {
            return Err(ClusterLabError::Validation(format!(
                "disk {} is unclaimed and holds no data",
                disk_id
            )));
        }

        let cascades = self.architecture == Architecture::Mirrored && role == DiskRole::Cache;
        if cascades {
            // Losing the cache disk loses the whole disk group; the host
            // drops out entirely and the host-failure effect path applies.
            events.error(format!(
                "Cache disk {} failed: entire disk group on {} lost. Cluster state: CRITICAL.",
                disk_id, host_name
            ));
            let survivors: Vec<String> = topology
                .connected_data_hosts()
                .iter()
                .filter(|h| h.id != host_id)
                .map(|h| h.id.clone())
                .collect();

            let disk_ids: Vec<String> = topology
                .host(&host_id)
                .disks
                .iter()
                .map(|d| d.id.clone())
                .collect();
            for id in disk_ids {
                topology.set_disk_health(&host_id, &id, DiskHealth::Failed);
            }
            topology.set_host_status(&host_id, HostStatus::Disconnected);
            health.mark_critical();

            restart_vms_from(&host_id, &survivors, topology, vms, events);
        } else {
            // Localized failure: redundancy degrades without breaking quorum.
            topology.set_disk_health(&host_id, disk_id, DiskHealth::Failed);
            health.mark_warning();
            events.error(format!(
                "Disk {} on {} failed. VMs remain available. Cluster state: WARNING.",
                disk_id, host_name
            ));
            for vm in vms.iter_mut() {
                if vm.has_component_on(&host_id) {
                    vm.compliance = Compliance::NonCompliant;
                    for component in vm.components.iter_mut() {
                        if component.host_id == host_id {
                            component.status = ComponentStatus::Stale;
                        }
                    }
                }
            }
        }

        info!(disk = disk_id, host = %host_id, ?role, cascades, "Disk fault injected");
        Ok(())
    }
}

/// HA restart semantics: every VM placed on the failed host moves round
/// robin to a surviving data host and is forced PoweredOn (NonCompliant);
/// with no survivor it is forced PoweredOff instead. VMs merely holding a
/// storage component on the host become NonCompliant without relocation.
pub(crate) fn restart_vms_from(
    host_id: &str,
    survivors: &[String],
    topology: &Topology,
    vms: &mut [VirtualMachine],
    events: &EventLog,
) {
    let mut next = 0usize;
    for vm in vms.iter_mut() {
        for component in vm.components.iter_mut() {
            if component.host_id == host_id {
                component.status = ComponentStatus::Absent;
            }
        }
        if vm.host_id == host_id {
            if survivors.is_empty() {
                vm.power = PowerState::PoweredOff;
                vm.compliance = Compliance::NonCompliant;
                events.error(format!(
                    "No surviving host for VM {}; powered off.",
                    vm.name
                ));
            } else {
                let new_host = survivors[next % survivors.len()].clone();
                next += 1;
                events.info(format!(
                    "HA restart: VM {} restarting on host {}.",
                    vm.name,
                    topology.host(&new_host).short_name()
                ));
                vm.host_id = new_host;
                vm.power = PowerState::PoweredOn;
                vm.compliance = Compliance::NonCompliant;
            }
        } else if vm.has_component_on(host_id) {
            vm.compliance = Compliance::NonCompliant;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::placement::PlacementEngine;
    use crate::types::StoragePolicy;

    fn standard_setup(n: usize) -> (Topology, Vec<VirtualMachine>, HealthMonitor, EventLog) {
        let mut topo = Topology::seed(Scenario::Standard, Architecture::Mirrored, "8.0 U2");
        for i in 1..=n {
            let id = format!("h{}", i);
            topo.join(&id);
            topo.set_traffic_enabled(&id, true);
            topo.set_disk_claim(&id, &format!("naa.500{}", i), DiskRole::Cache);
            topo.set_disk_claim(&id, &format!("naa.600{}1", i), DiskRole::Capacity);
        }
        (topo, Vec::new(), HealthMonitor::new(), EventLog::new())
    }

    fn deploy_vms(topo: &Topology, count: usize, policy: StoragePolicy) -> Vec<VirtualMachine> {
        let engine = PlacementEngine::new(Scenario::Standard);
        let hosts = topo.active_hosts();
        let data: Vec<&crate::types::Host> =
            hosts.iter().copied().filter(|h| !h.is_witness).collect();
        (0..count)
            .map(|i| {
                let id = format!("vm{}", i + 1);
                VirtualMachine {
                    components: engine.place(i, &id, policy, &hosts),
                    id: id.clone(),
                    name: format!("App-Server-{:02}", i + 1),
                    host_id: data[i % data.len()].id.clone(),
                    power: PowerState::PoweredOn,
                    compliance: Compliance::Compliant,
                    policy,
                    logical_size_gb: 100,
                    consumed_space_gb: policy.consumed_space_gb(100),
                }
            })
            .collect()
    }

    #[test]
    fn test_host_failure_relocates_and_goes_critical() {
        let (mut topo, _, mut health, events) = standard_setup(3);
        let mut vms = deploy_vms(&topo, 3, StoragePolicy::Raid1Ftt1);
        let orch = FailureOrchestrator::new(Scenario::Standard, Architecture::Mirrored);

        orch.inject(
            FaultKind::Host,
            "h1",
            StoragePolicy::Raid1Ftt1,
            &mut topo,
            &mut vms,
            &mut health,
            &events,
        )
        .unwrap();

        assert_eq!(topo.host("h1").status, HostStatus::Disconnected);
        assert_eq!(health.state(), crate::types::ClusterState::Critical);
        for vm in &vms {
            assert_ne!(vm.host_id, "h1");
            assert_eq!(vm.compliance, Compliance::NonCompliant);
            assert_eq!(vm.power, PowerState::PoweredOn);
        }
    }

    #[test]
    fn test_ftt_boundary_admission() {
        let (mut topo, _, mut health, events) = standard_setup(5);
        let mut vms = deploy_vms(&topo, 2, StoragePolicy::Raid1Ftt1);
        let orch = FailureOrchestrator::new(Scenario::Standard, Architecture::Mirrored);
        let policy = StoragePolicy::Raid1Ftt1;

        // First failure fits inside FTT=1.
        orch.inject(FaultKind::Host, "h1", policy, &mut topo, &mut vms, &mut health, &events)
            .unwrap();

        // Second concurrent failure exceeds the budget and is rejected.
        let err = orch
            .inject(FaultKind::Host, "h2", policy, &mut topo, &mut vms, &mut health, &events)
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(topo.host("h2").status, HostStatus::Connected);
    }

    #[test]
    fn test_network_partition_sets_isolation() {
        let (mut topo, _, mut health, events) = standard_setup(3);
        let mut vms = deploy_vms(&topo, 1, StoragePolicy::Raid1Ftt1);
        let orch = FailureOrchestrator::new(Scenario::Standard, Architecture::Mirrored);

        orch.inject(
            FaultKind::Network,
            "h2",
            StoragePolicy::Raid1Ftt1,
            &mut topo,
            &mut vms,
            &mut health,
            &events,
        )
        .unwrap();

        let h2 = topo.host("h2");
        assert_eq!(h2.status, HostStatus::Disconnected);
        assert_eq!(h2.isolation, IsolationStatus::Isolated);
    }

    #[test]
    fn test_cache_disk_failure_cascades_to_host() {
        let (mut topo, _, mut health, events) = standard_setup(3);
        let mut vms = deploy_vms(&topo, 2, StoragePolicy::Raid1Ftt1);
        let orch = FailureOrchestrator::new(Scenario::Standard, Architecture::Mirrored);

        orch.inject(
            FaultKind::Disk,
            "naa.5001",
            StoragePolicy::Raid1Ftt1,
            &mut topo,
            &mut vms,
            &mut health,
            &events,
        )
        .unwrap();

        let h1 = topo.host("h1");
        assert_eq!(h1.status, HostStatus::Disconnected);
        assert!(h1.disks.iter().all(|d| d.health == DiskHealth::Failed));
        assert_eq!(health.state(), crate::types::ClusterState::Critical);
        assert!(vms.iter().all(|vm| vm.host_id != "h1"));
    }

    #[test]
    fn test_capacity_disk_failure_is_localized() {
        let (mut topo, _, mut health, events) = standard_setup(3);
        let mut vms = deploy_vms(&topo, 2, StoragePolicy::Raid1Ftt1);
        let orch = FailureOrchestrator::new(Scenario::Standard, Architecture::Mirrored);

        orch.inject(
            FaultKind::Disk,
            "naa.60011",
            StoragePolicy::Raid1Ftt1,
            &mut topo,
            &mut vms,
            &mut health,
            &events,
        )
        .unwrap();

        let h1 = topo.host("h1");
        assert_eq!(h1.status, HostStatus::Connected);
        assert_eq!(
            h1.disk("naa.60011").unwrap().health,
            DiskHealth::Failed
        );
        assert_eq!(health.state(), crate::types::ClusterState::Warning);
        // VMs stayed where they were.
        assert!(vms.iter().any(|vm| vm.host_id == "h1"));
    }

    #[test]
    fn test_failed_disk_cannot_fail_again() {
        let (mut topo, _, mut health, events) = standard_setup(3);
        let mut vms = deploy_vms(&topo, 1, StoragePolicy::Raid1Ftt1);
        let orch = FailureOrchestrator::new(Scenario::Standard, Architecture::Mirrored);
        let policy = StoragePolicy::Raid1Ftt1;

        orch.inject(FaultKind::Disk, "naa.60011", policy, &mut topo, &mut vms, &mut health, &events)
            .unwrap();
        let err = orch
            .inject(FaultKind::Disk, "naa.60011", policy, &mut topo, &mut vms, &mut health, &events)
            .unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_unclaimed_disk_failure_rejected() {
        let (mut topo, _, mut health, events) = standard_setup(3);
        let mut vms = Vec::new();
        let orch = FailureOrchestrator::new(Scenario::Standard, Architecture::Mirrored);

        // naa.60012 was never claimed in the fixture.
        let err = orch
            .inject(
                FaultKind::Disk,
                "naa.60012",
                StoragePolicy::Raid1Ftt1,
                &mut topo,
                &mut vms,
                &mut health,
                &events,
            )
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_two_node_guard_keeps_one_data_host() {
        let mut topo = Topology::seed(Scenario::TwoNodeWitness, Architecture::Mirrored, "8.0 U2");
        for id in ["h1", "h2", "witness"] {
            topo.join(id);
            topo.set_traffic_enabled(id, true);
        }
        let mut health = HealthMonitor::new();
        let events = EventLog::new();
        let mut vms = Vec::new();
        let orch = FailureOrchestrator::new(Scenario::TwoNodeWitness, Architecture::Mirrored);
        let policy = StoragePolicy::Raid1Ftt1;

        orch.inject(FaultKind::Host, "h1", policy, &mut topo, &mut vms, &mut health, &events)
            .unwrap();

        // h2 is the last reachable data host; failing it is rejected.
        let err = orch
            .inject(FaultKind::Host, "h2", policy, &mut topo, &mut vms, &mut health, &events)
            .unwrap_err();
        assert!(err.is_rejection());
    }
}
