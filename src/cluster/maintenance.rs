//! Maintenance mode workflow: compute relocation, optional data
//! evacuation, host upgrades, and the exit path back to a healthy
//! cluster.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::cluster::recovery::RecoveryManager;
use crate::error::{ClusterLabError, Result};
use crate::events::EventLog;
use crate::health::HealthMonitor;
use crate::topology::Topology;
use crate::types::{
    Compliance, ComponentStatus, HostStatus, MaintenanceMode, VirtualMachine,
};
use tracing::info;

/// Evacuation progress advances in 20-point increments, upgrades in 10.
const EVACUATION_STEP_PCT: u8 = 20;
const UPGRADE_STEP_PCT: u8 = 10;

pub struct MaintenanceManager {
    clock: Arc<dyn Clock>,
    evacuation_step: Duration,
    upgrade_step: Duration,
}

impl MaintenanceManager {
    pub fn new(clock: Arc<dyn Clock>, evacuation_step: Duration, upgrade_step: Duration) -> Self {
        Self {
            clock,
            evacuation_step,
            upgrade_step,
        }
    }

    /// Put a host into maintenance mode.
    ///
    /// The witness appliance short-circuits: it holds no compute and no
    /// capacity, so it parks immediately and only degrades health to
    /// Warning. Data hosts relocate their VMs first (compute only, the
    /// VMs stay compliant), then either mark component-resident VMs
    /// non-compliant (`EnsureAccessibility`) or run the full evacuation
    /// meter (`FullDataEvacuation`). Only one host may be in maintenance
    /// at a time.
    pub async fn enter(
        &self,
        host_id: &str,
        mode: MaintenanceMode,
        topology: &mut Topology,
        vms: &mut [VirtualMachine],
        health: &mut HealthMonitor,
        events: &EventLog,
    ) -> Result<()> {
        if !topology.contains(host_id) {
            return Err(ClusterLabError::HostNotFound(host_id.to_string()));
        }
        if let Some(parked) = topology
            .hosts()
            .iter()
            .find(|h| h.status == HostStatus::Maintenance)
        {
            return Err(ClusterLabError::MaintenanceInProgress(
                parked.short_name().to_string(),
            ));
        }
        let host = topology.host(host_id);
        if host.status != HostStatus::Connected {
            return Err(ClusterLabError::Rejected(format!(
                "host {} is not connected",
                host.short_name()
            )));
        }
        let host_name = host.short_name().to_string();

        if host.is_witness {
            topology.set_host_status(host_id, HostStatus::Maintenance);
            health.mark_warning();
            events.info(format!(
                "Witness appliance {} entering maintenance. Quorum degraded. Cluster state: WARNING.",
                host_name
            ));
            return Ok(());
        }

        events.info(format!(
            "Host {} entering maintenance mode ({}).",
            host_name,
            match mode {
                MaintenanceMode::EnsureAccessibility => "ensure accessibility",
                MaintenanceMode::FullDataEvacuation => "full data evacuation",
            }
        ));

        let targets: Vec<String> = topology
            .connected_data_hosts()
            .iter()
            .filter(|h| h.id != host_id)
            .map(|h| h.id.clone())
            .collect();
        relocate_compute(host_id, &targets, topology, vms, events);

        match mode {
            MaintenanceMode::EnsureAccessibility => {
                for vm in vms.iter_mut() {
                    if vm.has_component_on(host_id) {
                        vm.compliance = Compliance::NonCompliant;
                    }
                }
            }
            MaintenanceMode::FullDataEvacuation => {
                self.run_evacuation(host_id, &host_name, &targets, vms, health, events)
                    .await?;
            }
        }

        topology.set_host_status(host_id, HostStatus::Maintenance);
        health.mark_warning();
        events.info(format!(
            "Host {} is in maintenance mode. Cluster state: WARNING.",
            host_name
        ));
        info!(host = host_id, ?mode, "Maintenance mode entered");
        Ok(())
    }

    /// Drive the evacuation meter, then migrate the host's storage
    /// components onto other data hosts. The cluster shows as resyncing
    /// while data moves.
    async fn run_evacuation(
        &self,
        host_id: &str,
        host_name: &str,
        targets: &[String],
        vms: &mut [VirtualMachine],
        health: &mut HealthMonitor,
        events: &EventLog,
    ) -> Result<()> {
        health.begin_resync()?;
        let mut progress = 0u8;
        while progress < 100 {
            self.clock.sleep(self.evacuation_step).await;
            progress += EVACUATION_STEP_PCT;
            // Keep the health meter in lockstep with the evacuation meter.
            while health.snapshot().resync_progress < progress {
                health.advance_resync();
            }
            if progress < 100 {
                events.info(format!(
                    "Evacuating data from {}: {}% complete.",
                    host_name, progress
                ));
            }
        }

        // Move each stranded component to the first target host not
        // already holding one of the same VM's components; when no such
        // host exists the component goes absent instead.
        for vm in vms.iter_mut() {
            let mut occupied: Vec<String> = vm
                .components
                .iter()
                .filter(|c| c.host_id != host_id)
                .map(|c| c.host_id.clone())
                .collect();
            let mut moved_any = false;
            for component in vm.components.iter_mut() {
                if component.host_id != host_id {
                    continue;
                }
                match targets.iter().find(|t| !occupied.contains(t)) {
                    Some(target) => {
                        component.host_id = target.clone();
                        component.status = ComponentStatus::Active;
                        occupied.push(target.clone());
                    }
                    None => {
                        component.status = ComponentStatus::Absent;
                        vm.compliance = Compliance::NonCompliant;
                    }
                }
                moved_any = true;
            }
            if moved_any {
                info!(vm = %vm.id, "Components evacuated");
            }
        }

        events.info(format!("Data evacuation from {} complete.", host_name));
        Ok(())
    }

    /// Leave maintenance mode and resync back to full compliance.
    pub async fn exit(
        &self,
        host_id: &str,
        topology: &mut Topology,
        vms: &mut [VirtualMachine],
        health: &mut HealthMonitor,
        events: &EventLog,
        recovery: &RecoveryManager,
    ) -> Result<()> {
        if !topology.contains(host_id) {
            return Err(ClusterLabError::HostNotFound(host_id.to_string()));
        }
        let host = topology.host(host_id);
        if host.status != HostStatus::Maintenance {
            return Err(ClusterLabError::Rejected(format!(
                "host {} is not in maintenance mode",
                host.short_name()
            )));
        }
        let host_name = host.short_name().to_string();

        topology.set_host_status(host_id, HostStatus::Connected);
        events.info(format!("Host {} exiting maintenance mode.", host_name));
        recovery.resync(vms, health, events).await?;
        info!(host = host_id, "Maintenance mode exited");
        Ok(())
    }

    /// Upgrade a parked host to the target version. Only hosts already in
    /// maintenance mode may upgrade.
    pub async fn upgrade(
        &self,
        host_id: &str,
        target_version: &str,
        topology: &mut Topology,
        events: &EventLog,
    ) -> Result<()> {
        if !topology.contains(host_id) {
            return Err(ClusterLabError::HostNotFound(host_id.to_string()));
        }
        let host = topology.host(host_id);
        if host.status != HostStatus::Maintenance {
            return Err(ClusterLabError::Rejected(format!(
                "host {} must be in maintenance mode before upgrading",
                host.short_name()
            )));
        }
        if host.version == target_version {
            return Err(ClusterLabError::Rejected(format!(
                "host {} already runs {}",
                host.short_name(),
                target_version
            )));
        }
        let host_name = host.short_name().to_string();

        events.info(format!(
            "Starting upgrade of {} to {}.",
            host_name, target_version
        ));
        let mut progress = 0u8;
        while progress < 100 {
            self.clock.sleep(self.upgrade_step).await;
            progress += UPGRADE_STEP_PCT;
            match progress {
                30 => events.info(format!("{}: staging ESXi image.", host_name)),
                60 => events.info(format!("{}: installing update.", host_name)),
                80 => events.info(format!("{}: rebooting.", host_name)),
                _ => {}
            }
        }
        topology.set_version(host_id, target_version);
        events.info(format!(
            "Host {} upgraded to {}.",
            host_name, target_version
        ));
        info!(host = host_id, version = target_version, "Host upgraded");
        Ok(())
    }
}

/// Relocate compute off a host before it parks. Unlike an HA restart the
/// VMs never lose availability, so compliance and power are untouched.
fn relocate_compute(
    host_id: &str,
    targets: &[String],
    topology: &Topology,
    vms: &mut [VirtualMachine],
    events: &EventLog,
) {
    if targets.is_empty() {
        return;
    }
    let mut next = 0usize;
    for vm in vms.iter_mut() {
        if vm.host_id == host_id {
            let target = targets[next % targets.len()].clone();
            next += 1;
            events.info(format!(
                "vMotion: VM {} migrated to {}.",
                vm.name,
                topology.host(&target).short_name()
            ));
            vm.host_id = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::NoopClock;
    use crate::types::{
        Architecture, ClusterState, DiskRole, PowerState, Scenario, StoragePolicy,
    };

    fn manager() -> MaintenanceManager {
        MaintenanceManager::new(
            Arc::new(NoopClock),
            Duration::from_millis(0),
            Duration::from_millis(0),
        )
    }

    fn recovery() -> RecoveryManager {
        RecoveryManager::new(Arc::new(NoopClock), Duration::from_millis(0))
    }

    fn setup(hosts: usize) -> (Topology, Vec<VirtualMachine>, HealthMonitor, EventLog) {
        let mut topo = Topology::seed(Scenario::Standard, Architecture::Mirrored, "8.0 U2");
        for i in 1..=hosts {
            let id = format!("h{}", i);
            topo.join(&id);
            topo.set_traffic_enabled(&id, true);
            topo.set_disk_claim(&id, &format!("naa.500{}", i), DiskRole::Cache);
            topo.set_disk_claim(&id, &format!("naa.600{}1", i), DiskRole::Capacity);
        }
        (topo, Vec::new(), HealthMonitor::new(), EventLog::new())
    }

    fn make_vm(n: usize, host: &str) -> VirtualMachine {
        VirtualMachine {
            id: format!("vm{}", n),
            name: format!("App-Server-{:02}", n),
            host_id: host.to_string(),
            power: PowerState::PoweredOn,
            compliance: Compliance::Compliant,
            policy: StoragePolicy::Raid1Ftt1,
            logical_size_gb: 100,
            consumed_space_gb: 200,
            components: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_enter_relocates_compute_and_parks_host() {
        let (mut topo, _, mut health, events) = setup(3);
        let mut vms = vec![make_vm(1, "h1"), make_vm(2, "h2")];

        manager()
            .enter(
                "h1",
                MaintenanceMode::EnsureAccessibility,
                &mut topo,
                &mut vms,
                &mut health,
                &events,
            )
            .await
            .unwrap();

        assert_eq!(topo.host("h1").status, HostStatus::Maintenance);
        assert_ne!(vms[0].host_id, "h1");
        assert_eq!(vms[0].compliance, Compliance::Compliant);
        assert_eq!(vms[0].power, PowerState::PoweredOn);
        assert_eq!(health.state(), ClusterState::Warning);
    }

    #[tokio::test]
    async fn test_single_maintenance_at_a_time() {
        let (mut topo, mut vms, mut health, events) = setup(3);
        let mgr = manager();

        mgr.enter("h1", MaintenanceMode::EnsureAccessibility, &mut topo, &mut vms, &mut health, &events)
            .await
            .unwrap();
        let err = mgr
            .enter("h2", MaintenanceMode::EnsureAccessibility, &mut topo, &mut vms, &mut health, &events)
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterLabError::MaintenanceInProgress(_)));
    }

    #[tokio::test]
    async fn test_witness_maintenance_short_circuits() {
        let mut topo = Topology::seed(Scenario::TwoNodeWitness, Architecture::Mirrored, "8.0 U2");
        for id in ["h1", "h2", "witness"] {
            topo.join(id);
            topo.set_traffic_enabled(id, true);
        }
        let mut health = HealthMonitor::new();
        let events = EventLog::new();
        let mut vms = vec![make_vm(1, "h1")];

        manager()
            .enter(
                "witness",
                MaintenanceMode::FullDataEvacuation,
                &mut topo,
                &mut vms,
                &mut health,
                &events,
            )
            .await
            .unwrap();

        assert_eq!(topo.host("witness").status, HostStatus::Maintenance);
        assert_eq!(health.state(), ClusterState::Warning);
        // No evacuation ran and the VM never moved.
        assert_eq!(vms[0].host_id, "h1");
    }

    #[tokio::test]
    async fn test_full_evacuation_moves_components_off_host() {
        let (mut topo, _, mut health, events) = setup(5);
        let mut vm = make_vm(1, "h1");
        vm.components = vec![
            crate::types::VmComponent::new("vm1-home", crate::types::ComponentKind::VmHome, "h1"),
            crate::types::VmComponent::new("vm1-d1", crate::types::ComponentKind::DataReplica, "h2"),
            crate::types::VmComponent::new("vm1-d2", crate::types::ComponentKind::DataReplica, "h1"),
            crate::types::VmComponent::new("vm1-w1", crate::types::ComponentKind::Witness, "h3"),
        ];
        let mut vms = vec![vm];

        manager()
            .enter(
                "h1",
                MaintenanceMode::FullDataEvacuation,
                &mut topo,
                &mut vms,
                &mut health,
                &events,
            )
            .await
            .unwrap();

        assert!(vms[0].components.iter().all(|c| c.host_id != "h1"));
        assert_eq!(vms[0].compliance, Compliance::Compliant);
        assert!(events
            .history()
            .iter()
            .any(|e| e.message.contains("60% complete")));
    }

    #[tokio::test]
    async fn test_exit_resyncs_back_to_healthy() {
        let (mut topo, _, mut health, events) = setup(3);
        let mut vms = vec![make_vm(1, "h2")];
        let mgr = manager();

        mgr.enter("h1", MaintenanceMode::EnsureAccessibility, &mut topo, &mut vms, &mut health, &events)
            .await
            .unwrap();
        mgr.exit("h1", &mut topo, &mut vms, &mut health, &events, &recovery())
            .await
            .unwrap();

        assert_eq!(topo.host("h1").status, HostStatus::Connected);
        assert_eq!(health.state(), ClusterState::Healthy);
        assert_eq!(vms[0].compliance, Compliance::Compliant);
    }

    #[tokio::test]
    async fn test_upgrade_requires_maintenance_mode() {
        let (mut topo, _, _, events) = setup(3);
        let err = manager()
            .upgrade("h1", "8.0 U3", &mut topo, &events)
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(topo.host("h1").version, "8.0 U2");
    }

    #[tokio::test]
    async fn test_upgrade_sets_version_and_logs_stages() {
        let (mut topo, mut vms, mut health, events) = setup(3);
        let mgr = manager();

        mgr.enter("h1", MaintenanceMode::EnsureAccessibility, &mut topo, &mut vms, &mut health, &events)
            .await
            .unwrap();
        mgr.upgrade("h1", "8.0 U3", &mut topo, &events).await.unwrap();

        assert_eq!(topo.host("h1").version, "8.0 U3");
        let log = events.history();
        assert!(log.iter().any(|e| e.message.contains("staging ESXi image")));
        assert!(log.iter().any(|e| e.message.contains("rebooting")));
        assert!(log.iter().any(|e| e.message.contains("upgraded to 8.0 U3")));
    }
}
