//! The simulator facade: single owner of all cluster state.
//!
//! Every command mutates state through `&mut self`, so workflows never
//! overlap; async methods interleave their mutations with clock sleeps
//! to model stepped progress. Expected domain conditions return errors,
//! they never panic.

use std::sync::Arc;

use crate::capacity;
use crate::clock::{Clock, TokioClock};
use crate::cluster::{
    ClusterStatus, FailureOrchestrator, LoadBalancer, MaintenanceManager, PlacementEngine,
    RecoveryManager,
};
use crate::config::ClusterLabConfig;
use crate::error::{ClusterLabError, Result};
use crate::events::{Event, EventLog};
use crate::health::HealthMonitor;
use crate::topology::Topology;
use crate::types::{
    Architecture, ClusterHealthSnapshot, Compliance, DiskRole, FaultKind, Host, HostStatus,
    MaintenanceMode, PowerState, Scenario, StoragePolicy, VirtualMachine, VmId,
};
use crate::validation;
use tracing::info;

/// Training-cluster simulator. Owns topology, VMs, health, and the event
/// log; commands drive it through the same lifecycle an operator would.
pub struct Simulator {
    config: ClusterLabConfig,
    clock: Arc<dyn Clock>,
    scenario: Scenario,
    architecture: Architecture,
    topology: Topology,
    vms: Vec<VirtualMachine>,
    health: HealthMonitor,
    events: EventLog,
    policy: StoragePolicy,
    cluster_created: bool,
    vsan_deployed: bool,
    recovery: RecoveryManager,
    balancer: LoadBalancer,
    maintenance: MaintenanceManager,
}

impl Simulator {
    pub fn new(config: ClusterLabConfig) -> Self {
        Self::with_clock(config, Arc::new(TokioClock))
    }

    /// Build a simulator with an explicit clock, for tests that must not
    /// wait on real time.
    pub fn with_clock(config: ClusterLabConfig, clock: Arc<dyn Clock>) -> Self {
        let scenario = config.scenario;
        let architecture = config.architecture;
        let topology = Topology::seed(scenario, architecture, &config.initial_version);
        let timing = config.timing.clone();
        Self {
            recovery: RecoveryManager::new(clock.clone(), timing.resync_step),
            balancer: LoadBalancer::new(clock.clone(), timing.migration_settle),
            maintenance: MaintenanceManager::new(
                clock.clone(),
                timing.evacuation_step,
                timing.upgrade_step,
            ),
            config,
            clock,
            scenario,
            architecture,
            topology,
            vms: Vec::new(),
            health: HealthMonitor::new(),
            events: EventLog::new(),
            policy: StoragePolicy::Raid1Ftt1,
            cluster_created: false,
            vsan_deployed: false,
        }
    }

    // ---- lifecycle ----

    /// Switch deployment topology. Re-seeds the fleet and discards any
    /// cluster built so far.
    pub fn select_scenario(&mut self, scenario: Scenario) {
        self.scenario = scenario;
        self.reseed();
        self.events.info(match scenario {
            Scenario::Standard => "Scenario selected: standard cluster.",
            Scenario::TwoNodeWitness => "Scenario selected: two-node cluster with witness.",
        });
    }

    /// Switch storage architecture. Re-seeds the fleet (different disk
    /// inventories) and discards any cluster built so far.
    pub fn set_architecture(&mut self, architecture: Architecture) {
        self.architecture = architecture;
        self.reseed();
        self.events.info(match architecture {
            Architecture::Mirrored => "Architecture selected: hybrid disk groups (cache + capacity).",
            Architecture::Pooled => "Architecture selected: single-tier storage pool.",
        });
    }

    /// Create the (empty) cluster object.
    pub fn create_cluster(&mut self) -> Result<()> {
        if self.cluster_created {
            return Err(ClusterLabError::InvalidState(
                "cluster already created".to_string(),
            ));
        }
        self.cluster_created = true;
        self.events.info(format!(
            "Cluster '{}' created. Add hosts to continue.",
            self.config.cluster_name
        ));
        Ok(())
    }

    /// Move the selected hosts from the inventory into the cluster.
    ///
    /// A standard cluster needs at least three hosts; the two-node
    /// topology needs both data hosts, and pulls the witness appliance in
    /// with them.
    pub fn add_hosts(&mut self, host_ids: &[&str]) -> Result<()> {
        self.require_cluster()?;
        for id in host_ids {
            if !self.topology.contains(id) {
                return Err(ClusterLabError::HostNotFound(id.to_string()));
            }
            if self.topology.host(id).status != HostStatus::Unmanaged {
                return Err(ClusterLabError::Validation(format!(
                    "host {} is already part of the cluster",
                    self.topology.host(id).short_name()
                )));
            }
        }
        match self.scenario {
            Scenario::Standard => {
                if host_ids.len() < 3 {
                    return Err(ClusterLabError::InsufficientHosts {
                        have: host_ids.len(),
                        need: 3,
                    });
                }
            }
            Scenario::TwoNodeWitness => {
                let data_selected = host_ids
                    .iter()
                    .filter(|id| !self.topology.host(id).is_witness)
                    .count();
                if data_selected < 2 {
                    return Err(ClusterLabError::InsufficientHosts {
                        have: data_selected,
                        need: 2,
                    });
                }
            }
        }

        for id in host_ids {
            self.topology.join(id);
        }
        // The witness appliance always accompanies a two-node deployment.
        if self.scenario == Scenario::TwoNodeWitness
            && self.topology.host("witness").status == HostStatus::Unmanaged
        {
            self.topology.join("witness");
        }
        self.events.info(format!(
            "{} host(s) added to cluster '{}'.",
            host_ids.len(),
            self.config.cluster_name
        ));
        Ok(())
    }

    /// Detach a host again. Only allowed while no VM depends on it.
    pub fn remove_host(&mut self, host_id: &str) -> Result<()> {
        self.require_cluster()?;
        if !self.topology.contains(host_id) {
            return Err(ClusterLabError::HostNotFound(host_id.to_string()));
        }
        let in_use = self
            .vms
            .iter()
            .any(|vm| vm.host_id == host_id || vm.has_component_on(host_id));
        if in_use {
            return Err(ClusterLabError::Rejected(format!(
                "host {} still holds VM compute or storage components",
                self.topology.host(host_id).short_name()
            )));
        }
        let name = self.topology.host(host_id).short_name().to_string();
        self.topology.leave(host_id);
        self.events
            .info(format!("Host {} removed from the cluster.", name));
        Ok(())
    }

    /// Enable or disable the vSAN VMkernel service on a host.
    pub fn toggle_traffic(&mut self, host_id: &str) -> Result<bool> {
        self.require_cluster()?;
        if !self.topology.contains(host_id) {
            return Err(ClusterLabError::HostNotFound(host_id.to_string()));
        }
        let enabled = !self.topology.host(host_id).vsan_traffic_enabled;
        self.topology.set_traffic_enabled(host_id, enabled);
        Ok(enabled)
    }

    /// Claim or unclaim a disk. Returns the role the disk ends up with.
    pub fn claim_disk(&mut self, host_id: &str, disk_id: &str, role: DiskRole) -> Result<DiskRole> {
        self.require_cluster()?;
        if !self.topology.contains(host_id) {
            return Err(ClusterLabError::HostNotFound(host_id.to_string()));
        }
        validation::claim_disk(&mut self.topology, self.architecture, host_id, disk_id, role)
    }

    /// Check that every cluster host has its storage service enabled.
    pub fn validate_services(&self) -> Result<()> {
        validation::services_ready(&self.topology)
    }

    /// Check that every cluster host has a usable disk claim for the
    /// selected architecture.
    pub fn validate_disks(&self) -> Result<()> {
        validation::disks_ready(&self.topology, self.scenario, self.architecture)
    }

    /// Run both validation gates and bring the datastore online.
    pub fn deploy_vsan(&mut self) -> Result<()> {
        self.require_cluster()?;
        if self.vsan_deployed {
            return Err(ClusterLabError::InvalidState(
                "datastore already deployed".to_string(),
            ));
        }
        self.validate_services()?;
        self.validate_disks()?;
        self.vsan_deployed = true;
        let raw = capacity::total_raw_gb(self.topology.hosts());
        self.events.info(format!(
            "vSAN datastore online. Raw capacity: {} GB.",
            raw
        ));
        info!(raw_gb = raw, "Datastore deployed");
        Ok(())
    }

    /// Deploy the configured VM fleet under the given storage policy.
    ///
    /// Compute spreads round robin over the data hosts; storage layout is
    /// delegated per VM ordinal to the placement engine. Fails without
    /// side effects when the active host count cannot satisfy the policy.
    pub fn deploy_vms(&mut self, policy: StoragePolicy) -> Result<()> {
        self.require_deployed()?;
        if !self.vms.is_empty() {
            return Err(ClusterLabError::InvalidState(
                "VMs already deployed".to_string(),
            ));
        }
        let engine = PlacementEngine::new(self.scenario);
        let active = self.topology.active_hosts();
        let compute: Vec<&Host> = active
            .iter()
            .copied()
            .filter(|h| h.is_compute_eligible() && h.has_claimed_disk())
            .collect();
        if compute.is_empty() {
            return Err(ClusterLabError::InsufficientHosts { have: 0, need: 1 });
        }
        if self.scenario == Scenario::Standard && compute.len() < policy.min_hosts() {
            return Err(ClusterLabError::InsufficientHosts {
                have: compute.len(),
                need: policy.min_hosts(),
            });
        }

        let mut vms = Vec::with_capacity(self.config.vm_count);
        for ordinal in 0..self.config.vm_count {
            let id: VmId = format!("vm-{:03}", ordinal + 1);
            let components = engine.place(ordinal, &id, policy, &active);
            if components.is_empty() {
                return Err(ClusterLabError::PlacementFailed(format!(
                    "policy {} not satisfiable with {} active host(s)",
                    policy,
                    active.len()
                )));
            }
            let size = self.config.vm_sizes_gb[ordinal % self.config.vm_sizes_gb.len()];
            vms.push(VirtualMachine {
                id,
                name: format!("App-Server-{:02}", ordinal + 1),
                host_id: compute[ordinal % compute.len()].id.clone(),
                power: PowerState::PoweredOn,
                compliance: Compliance::Compliant,
                policy,
                logical_size_gb: size,
                consumed_space_gb: policy.consumed_space_gb(size),
                components,
            });
        }
        self.policy = policy;
        self.vms = vms;
        self.events.info(format!(
            "{} VMs deployed with policy {} ({}x overhead). Consumed: {} GB.",
            self.vms.len(),
            policy,
            policy.multiplier(),
            capacity::total_consumed_gb(&self.vms)
        ));
        info!(count = self.vms.len(), %policy, "VM fleet deployed");
        Ok(())
    }

    /// Add a previously unmanaged host to a running cluster. Its disks
    /// are claimed automatically and a rebalance pass follows once the
    /// scheduling delay elapses.
    pub async fn add_reserve_host(&mut self, host_id: &str) -> Result<()> {
        self.require_deployed()?;
        if !self.topology.contains(host_id) {
            return Err(ClusterLabError::HostNotFound(host_id.to_string()));
        }
        if self.topology.host(host_id).status != HostStatus::Unmanaged {
            return Err(ClusterLabError::Validation(format!(
                "host {} is already part of the cluster",
                self.topology.host(host_id).short_name()
            )));
        }

        self.topology.join(host_id);
        self.topology.set_traffic_enabled(host_id, true);
        self.auto_claim(host_id)?;
        let name = self.topology.host(host_id).short_name().to_string();
        self.events.info(format!(
            "Host {} added to the running cluster. Capacity expanded to {} GB.",
            name,
            capacity::total_raw_gb(self.topology.hosts())
        ));

        self.schedule_rebalance().await;
        Ok(())
    }

    // ---- fault workflows ----

    /// Inject a failure against a host, disk, or network link.
    pub fn inject_failure(&mut self, kind: FaultKind, target: &str) -> Result<()> {
        self.require_deployed()?;
        if self.health.is_resyncing() {
            return Err(ClusterLabError::ResyncInProgress);
        }
        let orchestrator = FailureOrchestrator::new(self.scenario, self.architecture);
        orchestrator.inject(
            kind,
            target,
            self.policy,
            &mut self.topology,
            &mut self.vms,
            &mut self.health,
            &self.events,
        )
    }

    /// Recover a failed entity, then resync. When the cluster lands back
    /// in a healthy state a rebalance pass is scheduled.
    pub async fn recover(&mut self, kind: FaultKind, target: &str) -> Result<()> {
        self.require_deployed()?;
        self.recovery
            .recover(
                kind,
                target,
                &mut self.topology,
                &mut self.vms,
                &mut self.health,
                &self.events,
            )
            .await?;
        if self.health.state().is_healthy() {
            self.schedule_rebalance().await;
        }
        Ok(())
    }

    // ---- maintenance workflows ----

    pub async fn enter_maintenance(&mut self, host_id: &str, mode: MaintenanceMode) -> Result<()> {
        self.require_deployed()?;
        self.maintenance
            .enter(
                host_id,
                mode,
                &mut self.topology,
                &mut self.vms,
                &mut self.health,
                &self.events,
            )
            .await
    }

    pub async fn exit_maintenance(&mut self, host_id: &str) -> Result<()> {
        self.require_deployed()?;
        self.maintenance
            .exit(
                host_id,
                &mut self.topology,
                &mut self.vms,
                &mut self.health,
                &self.events,
                &self.recovery,
            )
            .await?;
        if self.health.state().is_healthy() {
            self.schedule_rebalance().await;
        }
        Ok(())
    }

    /// Upgrade a parked host to the configured target version.
    pub async fn upgrade_host(&mut self, host_id: &str) -> Result<()> {
        self.require_deployed()?;
        let target = self.config.target_version.clone();
        self.maintenance
            .upgrade(host_id, &target, &mut self.topology, &self.events)
            .await
    }

    // ---- balancing ----

    /// Run a rebalance pass immediately. Returns the number of VMs moved.
    pub async fn rebalance_now(&mut self) -> Result<usize> {
        self.require_deployed()?;
        Ok(self
            .balancer
            .rebalance(&self.topology, &mut self.vms, &self.events)
            .await)
    }

    async fn schedule_rebalance(&mut self) {
        if !LoadBalancer::needs_rebalance(&self.topology, &self.vms) {
            return;
        }
        self.clock.sleep(self.config.timing.rebalance_delay).await;
        self.balancer
            .rebalance(&self.topology, &mut self.vms, &self.events)
            .await;
    }

    /// Tear everything down and return to the initial inventory.
    pub fn reset(&mut self) {
        self.reseed();
        self.events.clear();
        self.events.info("Simulation reset.");
    }

    // ---- queries ----

    pub fn hosts(&self) -> &[Host] {
        self.topology.hosts()
    }

    pub fn vms(&self) -> &[VirtualMachine] {
        &self.vms
    }

    pub fn health(&self) -> ClusterHealthSnapshot {
        self.health.snapshot()
    }

    /// Raw and consumed datastore capacity, in GB.
    pub fn capacity(&self) -> (u64, u64) {
        (
            capacity::total_raw_gb(self.topology.hosts()),
            capacity::total_consumed_gb(&self.vms),
        )
    }

    pub fn status(&self) -> ClusterStatus {
        ClusterStatus::gather(&self.topology, &self.vms, &self.health)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.history()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    // ---- internals ----

    fn reseed(&mut self) {
        self.topology = Topology::seed(self.scenario, self.architecture, &self.config.initial_version);
        self.vms.clear();
        self.health.reset();
        self.cluster_created = false;
        self.vsan_deployed = false;
    }

    fn require_cluster(&self) -> Result<()> {
        if !self.cluster_created {
            return Err(ClusterLabError::InvalidState(
                "no cluster created yet".to_string(),
            ));
        }
        Ok(())
    }

    fn require_deployed(&self) -> Result<()> {
        self.require_cluster()?;
        if !self.vsan_deployed {
            return Err(ClusterLabError::InvalidState(
                "datastore not deployed yet".to_string(),
            ));
        }
        Ok(())
    }

    /// Default disk claim for a host joining after deployment.
    fn auto_claim(&mut self, host_id: &str) -> Result<()> {
        let disks: Vec<(String, crate::types::MediaType)> = self
            .topology
            .host(host_id)
            .disks
            .iter()
            .map(|d| (d.id.clone(), d.media))
            .collect();
        match self.architecture {
            Architecture::Mirrored => {
                let mut cache_claimed = false;
                for (disk_id, media) in disks {
                    if media.is_flash() && !cache_claimed {
                        validation::claim_disk(
                            &mut self.topology,
                            self.architecture,
                            host_id,
                            &disk_id,
                            DiskRole::Cache,
                        )?;
                        cache_claimed = true;
                    } else if !media.is_flash() {
                        validation::claim_disk(
                            &mut self.topology,
                            self.architecture,
                            host_id,
                            &disk_id,
                            DiskRole::Capacity,
                        )?;
                    }
                }
            }
            Architecture::Pooled => {
                for (disk_id, _) in disks {
                    validation::claim_disk(
                        &mut self.topology,
                        self.architecture,
                        host_id,
                        &disk_id,
                        DiskRole::StoragePool,
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::NoopClock;
    use crate::types::ClusterState;

    fn test_simulator(scenario: Scenario, architecture: Architecture) -> Simulator {
        let mut config = ClusterLabConfig::development();
        config.scenario = scenario;
        config.architecture = architecture;
        Simulator::with_clock(config, Arc::new(NoopClock))
    }

    /// Drive a standard Mirrored cluster to a deployed datastore with the
    /// first `hosts` hosts configured.
    fn deployed_standard(hosts: usize) -> Simulator {
        let mut sim = test_simulator(Scenario::Standard, Architecture::Mirrored);
        sim.create_cluster().unwrap();
        let ids: Vec<String> = (1..=hosts).map(|i| format!("h{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        sim.add_hosts(&refs).unwrap();
        for i in 1..=hosts {
            let id = format!("h{}", i);
            sim.toggle_traffic(&id).unwrap();
            sim.claim_disk(&id, &format!("naa.500{}", i), DiskRole::Cache).unwrap();
            sim.claim_disk(&id, &format!("naa.600{}1", i), DiskRole::Capacity).unwrap();
        }
        sim.deploy_vsan().unwrap();
        sim
    }

    fn deployed_two_node() -> Simulator {
        let mut sim = test_simulator(Scenario::TwoNodeWitness, Architecture::Mirrored);
        sim.create_cluster().unwrap();
        sim.add_hosts(&["h1", "h2"]).unwrap();
        for i in 1..=2 {
            let id = format!("h{}", i);
            sim.toggle_traffic(&id).unwrap();
            sim.claim_disk(&id, &format!("naa.500{}", i), DiskRole::Cache).unwrap();
            sim.claim_disk(&id, &format!("naa.600{}1", i), DiskRole::Capacity).unwrap();
        }
        sim.toggle_traffic("witness").unwrap();
        sim.claim_disk("witness", "wit.meta.1", DiskRole::Witness).unwrap();
        sim.deploy_vsan().unwrap();
        sim
    }

    #[test]
    fn test_deploy_requires_cluster_first() {
        let mut sim = test_simulator(Scenario::Standard, Architecture::Mirrored);
        let err = sim.deploy_vsan().unwrap_err();
        assert!(matches!(err, ClusterLabError::InvalidState(_)));
    }

    #[test]
    fn test_standard_cluster_needs_three_hosts() {
        let mut sim = test_simulator(Scenario::Standard, Architecture::Mirrored);
        sim.create_cluster().unwrap();
        let err = sim.add_hosts(&["h1", "h2"]).unwrap_err();
        assert!(matches!(
            err,
            ClusterLabError::InsufficientHosts { have: 2, need: 3 }
        ));
    }

    #[test]
    fn test_two_node_pulls_in_witness() {
        let sim = deployed_two_node();
        assert_eq!(
            sim.hosts().iter().find(|h| h.is_witness).unwrap().status,
            HostStatus::Connected
        );
    }

    #[test]
    fn test_deploy_vsan_gates_on_traffic_and_disks() {
        let mut sim = test_simulator(Scenario::Standard, Architecture::Mirrored);
        sim.create_cluster().unwrap();
        sim.add_hosts(&["h1", "h2", "h3"]).unwrap();
        // Traffic not enabled anywhere yet.
        assert!(sim.deploy_vsan().unwrap_err().is_validation());
    }

    #[test]
    fn test_capacity_ledger_exact_consumed_space() {
        let mut sim = deployed_standard(3);
        sim.deploy_vms(StoragePolicy::Raid1Ftt1).unwrap();

        // One claimed 4000 GB capacity disk per host.
        let (raw, consumed) = sim.capacity();
        assert_eq!(raw, 12_000);
        // Sizes sum to 2550 GB; RAID-1 doubles them exactly.
        assert_eq!(consumed, 5_100);
    }

    #[test]
    fn test_raid5_policy_needs_four_hosts() {
        let mut sim = deployed_standard(3);
        let err = sim.deploy_vms(StoragePolicy::Raid5Ftt1).unwrap_err();
        assert!(matches!(
            err,
            ClusterLabError::InsufficientHosts { have: 3, need: 4 }
        ));
        assert!(sim.vms().is_empty());
    }

    #[tokio::test]
    async fn test_standard_failure_and_recovery_cycle() {
        let mut sim = deployed_standard(3);
        sim.deploy_vms(StoragePolicy::Raid1Ftt1).unwrap();

        sim.inject_failure(FaultKind::Host, "h1").unwrap();
        assert_eq!(sim.health().state, ClusterState::Critical);
        assert!(sim.vms().iter().all(|vm| vm.host_id != "h1"));
        assert!(sim
            .vms()
            .iter()
            .all(|vm| vm.compliance == Compliance::NonCompliant));

        sim.recover(FaultKind::Host, "h1").await.unwrap();
        assert_eq!(sim.health().state, ClusterState::Healthy);
        assert!(sim
            .vms()
            .iter()
            .all(|vm| vm.compliance == Compliance::Compliant));

        // The post-recovery rebalance restores the spread invariant.
        let status = sim.status();
        assert_eq!(status.connected_hosts, 3);
        let stats = LoadBalancer::stats(&sim.topology, &sim.vms);
        assert!(stats.spread() <= 1);
    }

    #[tokio::test]
    async fn test_failure_rejected_during_resync() {
        let mut sim = deployed_standard(5);
        sim.deploy_vms(StoragePolicy::Raid1Ftt2).unwrap();
        sim.inject_failure(FaultKind::Host, "h1").unwrap();

        // Drive recovery, then check a mid-resync injection cannot happen:
        // the guard is observable before any recovery starts.
        sim.health.begin_resync().unwrap();
        let err = sim.inject_failure(FaultKind::Host, "h2").unwrap_err();
        assert!(matches!(err, ClusterLabError::ResyncInProgress));
    }

    #[tokio::test]
    async fn test_two_node_failover_and_failback() {
        let mut sim = deployed_two_node();
        sim.deploy_vms(StoragePolicy::Raid1Ftt1).unwrap();

        sim.inject_failure(FaultKind::Host, "h1").unwrap();
        assert!(sim.vms().iter().all(|vm| vm.host_id == "h2"));
        assert_eq!(sim.health().state, ClusterState::Critical);

        // The surviving data host may not be failed as well.
        assert!(sim
            .inject_failure(FaultKind::Host, "h2")
            .unwrap_err()
            .is_rejection());

        sim.recover(FaultKind::Host, "h1").await.unwrap();
        assert_eq!(sim.health().state, ClusterState::Healthy);
        // Failback rebalances compute across both data hosts.
        let stats = LoadBalancer::stats(&sim.topology, &sim.vms);
        assert!(stats.spread() <= 1);
    }

    #[tokio::test]
    async fn test_maintenance_upgrade_roundtrip() {
        let mut sim = deployed_standard(4);
        sim.deploy_vms(StoragePolicy::Raid1Ftt1).unwrap();

        sim.enter_maintenance("h1", MaintenanceMode::EnsureAccessibility)
            .await
            .unwrap();
        assert_eq!(sim.health().state, ClusterState::Warning);
        sim.upgrade_host("h1").await.unwrap();
        sim.exit_maintenance("h1").await.unwrap();

        assert_eq!(sim.health().state, ClusterState::Healthy);
        let h1 = sim.hosts().iter().find(|h| h.id == "h1").unwrap();
        assert_eq!(h1.version, "8.0 U3");
        assert_eq!(h1.status, HostStatus::Connected);
    }

    #[tokio::test]
    async fn test_exit_maintenance_rebalances_emptied_host() {
        let mut sim = deployed_standard(4);
        sim.deploy_vms(StoragePolicy::Raid1Ftt1).unwrap();

        // Entering maintenance evacuates all compute off h1.
        sim.enter_maintenance("h1", MaintenanceMode::EnsureAccessibility)
            .await
            .unwrap();
        assert!(sim.vms().iter().all(|vm| vm.host_id != "h1"));

        // Exiting resyncs and spreads compute back over the idle host.
        sim.exit_maintenance("h1").await.unwrap();
        assert_eq!(sim.health().state, ClusterState::Healthy);
        let stats = LoadBalancer::stats(&sim.topology, &sim.vms);
        assert!(stats.spread() <= 1);
        assert!(sim.vms().iter().any(|vm| vm.host_id == "h1"));
    }

    #[tokio::test]
    async fn test_reserve_host_expands_capacity_and_rebalances() {
        let mut sim = deployed_standard(3);
        sim.deploy_vms(StoragePolicy::Raid1Ftt1).unwrap();
        let (raw_before, _) = sim.capacity();

        sim.add_reserve_host("h4").await.unwrap();
        let (raw_after, _) = sim.capacity();
        assert!(raw_after > raw_before);

        let stats = LoadBalancer::stats(&sim.topology, &sim.vms);
        assert!(stats.spread() <= 1);
    }

    #[test]
    fn test_reset_returns_to_inventory() {
        let mut sim = deployed_standard(3);
        sim.deploy_vms(StoragePolicy::Raid1Ftt1).unwrap();
        sim.reset();

        assert!(sim.vms().is_empty());
        assert_eq!(sim.health().state, ClusterState::Healthy);
        assert!(sim
            .hosts()
            .iter()
            .all(|h| h.status == HostStatus::Unmanaged));
        assert!(sim.create_cluster().is_ok());
    }

    #[test]
    fn test_remove_host_blocked_while_in_use() {
        let mut sim = deployed_standard(3);
        sim.deploy_vms(StoragePolicy::Raid1Ftt1).unwrap();
        assert!(sim.remove_host("h1").unwrap_err().is_rejection());
    }

    #[tokio::test]
    async fn test_event_stream_carries_workflow_progress() {
        let mut sim = deployed_standard(3);
        sim.deploy_vms(StoragePolicy::Raid1Ftt1).unwrap();
        let mut rx = sim.subscribe();

        sim.inject_failure(FaultKind::Host, "h2").unwrap();
        sim.recover(FaultKind::Host, "h2").await.unwrap();

        let mut saw_restart = false;
        let mut saw_complete = false;
        while let Ok(event) = rx.try_recv() {
            if event.message.contains("HA restart") {
                saw_restart = true;
            }
            if event.message.contains("Resynchronization complete") {
                saw_complete = true;
            }
        }
        assert!(saw_restart);
        assert!(saw_complete);
    }
}
