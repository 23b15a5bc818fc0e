//! DRS-style load balancer: equalizes VM count across compute-eligible
//! hosts until the spread between the most and least loaded host is at
//! most one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::events::EventLog;
use crate::topology::Topology;
use crate::types::{HostId, VirtualMachine, VmId};
use tracing::{debug, info};

/// A single planned VM migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOperation {
    pub vm_id: VmId,
    pub from: HostId,
    pub to: HostId,
}

/// Per-host load snapshot used to decide whether balancing is needed.
#[derive(Debug, Clone)]
pub struct BalanceStats {
    pub vm_counts: BTreeMap<HostId, usize>,
    pub min: usize,
    pub max: usize,
}

impl BalanceStats {
    pub fn spread(&self) -> usize {
        self.max - self.min
    }
}

pub struct LoadBalancer {
    clock: Arc<dyn Clock>,
    settle: Duration,
}

impl LoadBalancer {
    pub fn new(clock: Arc<dyn Clock>, settle: Duration) -> Self {
        Self { clock, settle }
    }

    /// Snapshot VM counts over the compute-eligible hosts, in discovery
    /// order. Hosts without VMs count as zero.
    pub fn stats(topology: &Topology, vms: &[VirtualMachine]) -> BalanceStats {
        let mut vm_counts: BTreeMap<HostId, usize> = BTreeMap::new();
        for host in topology.hosts() {
            if host.is_compute_eligible() && host.has_claimed_disk() {
                vm_counts.insert(host.id.clone(), 0);
            }
        }
        for vm in vms {
            if let Some(count) = vm_counts.get_mut(&vm.host_id) {
                *count += 1;
            }
        }
        let min = vm_counts.values().copied().min().unwrap_or(0);
        let max = vm_counts.values().copied().max().unwrap_or(0);
        BalanceStats { vm_counts, min, max }
    }

    /// Balanced means the most loaded host carries at most one more VM
    /// than the least loaded.
    pub fn needs_rebalance(topology: &Topology, vms: &[VirtualMachine]) -> bool {
        Self::stats(topology, vms).spread() > 1
    }

    /// Plan the migrations that restore balance. Deterministic: each step
    /// moves one VM from the currently most loaded host to the currently
    /// least loaded one, breaking count ties by host discovery order and
    /// picking the first movable VM in deployment order.
    pub fn create_plan(topology: &Topology, vms: &[VirtualMachine]) -> Vec<MoveOperation> {
        let eligible: Vec<HostId> = topology
            .hosts()
            .iter()
            .filter(|h| h.is_compute_eligible() && h.has_claimed_disk())
            .map(|h| h.id.clone())
            .collect();
        if eligible.len() < 2 {
            return Vec::new();
        }

        let mut counts: Vec<usize> = eligible
            .iter()
            .map(|id| vms.iter().filter(|vm| &vm.host_id == id).count())
            .collect();
        // Simulated placement of each VM as the plan accumulates.
        let mut placed: Vec<HostId> = vms.iter().map(|vm| vm.host_id.clone()).collect();
        let mut plan = Vec::new();

        loop {
            let (max_idx, &max) = counts
                .iter()
                .enumerate()
                .max_by_key(|&(i, &c)| (c, std::cmp::Reverse(i)))
                .expect("at least two eligible hosts");
            let (min_idx, &min) = counts
                .iter()
                .enumerate()
                .min_by_key(|&(i, &c)| (c, i))
                .expect("at least two eligible hosts");
            if max <= min + 1 {
                break;
            }

            let from = eligible[max_idx].clone();
            let to = eligible[min_idx].clone();
            let Some(vm_idx) = placed.iter().position(|h| h == &from) else {
                break;
            };
            placed[vm_idx] = to.clone();
            counts[max_idx] -= 1;
            counts[min_idx] += 1;
            plan.push(MoveOperation {
                vm_id: vms[vm_idx].id.clone(),
                from,
                to,
            });
        }

        debug!(moves = plan.len(), "Rebalance plan computed");
        plan
    }

    /// Execute a plan, letting each migration settle before the next.
    /// Returns the number of VMs moved.
    pub async fn rebalance(
        &self,
        topology: &Topology,
        vms: &mut [VirtualMachine],
        events: &EventLog,
    ) -> usize {
        let plan = Self::create_plan(topology, vms);
        if plan.is_empty() {
            return 0;
        }
        events.info(format!(
            "DRS: cluster imbalance detected, migrating {} VM(s).",
            plan.len()
        ));
        for op in &plan {
            self.clock.sleep(self.settle).await;
            if let Some(vm) = vms.iter_mut().find(|vm| vm.id == op.vm_id) {
                vm.host_id = op.to.clone();
                events.info(format!(
                    "DRS: migrated VM {} from {} to {}.",
                    vm.name,
                    topology.host(&op.from).short_name(),
                    topology.host(&op.to).short_name()
                ));
            }
        }
        events.info("DRS: cluster load is balanced.");
        info!(moves = plan.len(), "Rebalance complete");
        plan.len()
    }
}
