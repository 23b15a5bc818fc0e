//! Recovery of failed entities and the stepped resynchronization that
//! follows every successful heal.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::Result;
use crate::events::EventLog;
use crate::health::{HealthMonitor, RESYNC_STEP};
use crate::topology::Topology;
use crate::types::{
    Compliance, ComponentStatus, DiskHealth, FaultKind, HostStatus, IsolationStatus,
    VirtualMachine,
};
use tracing::info;

/// Heals hosts, disks, and network partitions, then drives the resync
/// progression back to a fully compliant cluster.
pub struct RecoveryManager {
    clock: Arc<dyn Clock>,
    resync_step: Duration,
}

impl RecoveryManager {
    pub fn new(clock: Arc<dyn Clock>, resync_step: Duration) -> Self {
        Self { clock, resync_step }
    }

    /// Recover the given entity. Recovering an entity that is already
    /// healthy is a no-op and does not start a resync. A heal that does
    /// take effect is followed by the full resync progression; only one
    /// resync may run at a time.
    pub async fn recover(
        &self,
        kind: FaultKind,
        target: &str,
        topology: &mut Topology,
        vms: &mut [VirtualMachine],
        health: &mut HealthMonitor,
        events: &EventLog,
    ) -> Result<()> {
        let healed = match kind {
            FaultKind::Host | FaultKind::Network => self.heal_host(target, topology, events)?,
            FaultKind::Disk => self.heal_disk(target, topology, events)?,
        };
        if !healed {
            return Ok(());
        }
        self.resync(vms, health, events).await
    }

    /// Reconnect a disconnected host. Every disk it holds comes back
    /// healthy with it; a lost disk group does not survive the host.
    fn heal_host(&self, host_id: &str, topology: &mut Topology, events: &EventLog) -> Result<bool> {
        if !topology.contains(host_id) {
            return Err(crate::error::ClusterLabError::HostNotFound(
                host_id.to_string(),
            ));
        }
        let host = topology.host(host_id);
        if host.status != HostStatus::Disconnected {
            return Ok(false);
        }
        let was_isolated = host.isolation == IsolationStatus::Isolated;
        let host_name = host.short_name().to_string();
        let disk_ids: Vec<String> = host.disks.iter().map(|d| d.id.clone()).collect();

        topology.set_host_status(host_id, HostStatus::Connected);
        topology.set_isolation(host_id, IsolationStatus::Normal);
        for disk_id in disk_ids {
            topology.set_disk_health(host_id, &disk_id, DiskHealth::Healthy);
        }

        if was_isolated {
            events.info(format!(
                "Network connectivity restored on host {}. Rejoining storage quorum.",
                host_name
            ));
        } else {
            events.info(format!("Host {} reconnected to the cluster.", host_name));
        }
        info!(host = host_id, was_isolated, "Host recovered");
        Ok(true)
    }

    fn heal_disk(&self, disk_id: &str, topology: &mut Topology, events: &EventLog) -> Result<bool> {
        let Some(owner) = topology.disk_owner(disk_id) else {
            return Err(crate::error::ClusterLabError::DiskNotFound(
                disk_id.to_string(),
            ));
        };
        let host_id = owner.id.clone();
        let host_name = owner.short_name().to_string();
        let disk = owner.disk(disk_id).expect("owner host must hold the disk");
        if disk.health == DiskHealth::Healthy && owner.status == HostStatus::Connected {
            return Ok(false);
        }

        // A disk behind a disconnected host cannot come back alone; the
        // heal pulls the whole host back with it.
        if owner.status == HostStatus::Disconnected {
            return self.heal_host(&host_id, topology, events);
        }

        topology.set_disk_health(&host_id, disk_id, DiskHealth::Healthy);
        events.info(format!(
            "Disk {} on {} replaced and back online.",
            disk_id, host_name
        ));
        info!(disk = disk_id, host = %host_id, "Disk recovered");
        Ok(true)
    }

    /// Run the resync progression to completion: fixed-size steps with a
    /// progress event every 20 points, then restore every VM and component
    /// to full compliance.
    pub async fn resync(
        &self,
        vms: &mut [VirtualMachine],
        health: &mut HealthMonitor,
        events: &EventLog,
    ) -> Result<()> {
        health.begin_resync()?;
        events.info("Resynchronization started: rebuilding storage components.");

        let mut progress = 0u8;
        while progress < 100 {
            self.clock.sleep(self.resync_step).await;
            progress = health.advance_resync();
            if progress < 100 && progress % 20 == 0 {
                events.info(format!("Resynchronization {}% complete.", progress));
            }
        }

        for vm in vms.iter_mut() {
            vm.compliance = Compliance::Compliant;
            for component in vm.components.iter_mut() {
                component.status = ComponentStatus::Active;
            }
        }
        events.info("Resynchronization complete. All objects compliant. Cluster state: HEALTHY.");
        info!(step = RESYNC_STEP, "Resync finished");
        Ok(())
    }
}
