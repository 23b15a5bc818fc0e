//! Placement engine for laying out VM storage components across hosts.

use crate::types::{ComponentKind, Host, Scenario, StoragePolicy, VmComponent};
use tracing::debug;

/// Computes the component layout for a VM under a storage policy.
///
/// Layouts are a deterministic function of the VM ordinal: successive VMs
/// rotate their replica/witness placement round-robin across the eligible
/// host list so the cluster fills evenly. No replica or witness of one VM
/// ever shares a host with another of its replicas/witnesses.
#[derive(Debug, Clone, Copy)]
pub struct PlacementEngine {
    scenario: Scenario,
}

impl PlacementEngine {
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario }
    }

    /// Compute the component list for one VM.
    ///
    /// `active_hosts` is the ordered list of Connected, traffic-enabled
    /// hosts (the witness appliance included when the topology defines one).
    /// Returns an empty list when the eligible host count cannot satisfy the
    /// policy; callers treat that as "policy not satisfiable now".
    pub fn place(
        &self,
        ordinal: usize,
        vm_id: &str,
        policy: StoragePolicy,
        active_hosts: &[&Host],
    ) -> Vec<VmComponent> {
        match self.scenario {
            Scenario::TwoNodeWitness => self.place_two_node(vm_id, active_hosts),
            Scenario::Standard => self.place_standard(ordinal, vm_id, policy, active_hosts),
        }
    }

    /// Fixed two-node layout: home plus one replica on data node 1, the
    /// mirrored replica on data node 2, the quorum witness on the appliance.
    /// Only two data hosts exist, so the layout is policy-independent.
    fn place_two_node(&self, vm_id: &str, active_hosts: &[&Host]) -> Vec<VmComponent> {
        let mut data = active_hosts.iter().filter(|h| !h.is_witness);
        let (Some(first), Some(second)) = (data.next(), data.next()) else {
            debug!(vm = vm_id, "Two-node placement unsatisfiable: missing data host");
            return Vec::new();
        };
        let Some(witness) = active_hosts.iter().find(|h| h.is_witness) else {
            debug!(vm = vm_id, "Two-node placement unsatisfiable: witness offline");
            return Vec::new();
        };

        vec![
            VmComponent::new(format!("{}-home", vm_id), ComponentKind::VmHome, &first.id),
            VmComponent::new(format!("{}-data-1", vm_id), ComponentKind::DataReplica, &first.id),
            VmComponent::new(format!("{}-data-2", vm_id), ComponentKind::DataReplica, &second.id),
            VmComponent::new(format!("{}-witness", vm_id), ComponentKind::Witness, &witness.id),
        ]
    }

    fn place_standard(
        &self,
        ordinal: usize,
        vm_id: &str,
        policy: StoragePolicy,
        active_hosts: &[&Host],
    ) -> Vec<VmComponent> {
        let data_hosts: Vec<&&Host> = active_hosts.iter().filter(|h| !h.is_witness).collect();
        let n = data_hosts.len();
        if n < policy.min_hosts() {
            debug!(
                vm = vm_id,
                %policy,
                eligible = n,
                need = policy.min_hosts(),
                "Placement unsatisfiable"
            );
            return Vec::new();
        }

        let at = |offset: usize| data_hosts[(ordinal + offset) % n].id.clone();

        let mut components = vec![VmComponent::new(
            format!("{}-home", vm_id),
            ComponentKind::VmHome,
            &data_hosts[0].id,
        )];

        if policy == StoragePolicy::Raid1Ftt3 {
            // 4 replicas + 3 witnesses across seven distinct hosts.
            for (i, offset) in (1..=4).enumerate() {
                components.push(VmComponent::new(
                    format!("{}-d{}", vm_id, i + 1),
                    ComponentKind::DataReplica,
                    at(offset),
                ));
            }
            for (i, offset) in [5, 6, 0].into_iter().enumerate() {
                components.push(VmComponent::new(
                    format!("{}-w{}", vm_id, i + 1),
                    ComponentKind::Witness,
                    at(offset),
                ));
            }
        } else {
            // Classic 2n+1 quorum layout: two replicas and a witness.
            components.push(VmComponent::new(
                format!("{}-d1", vm_id),
                ComponentKind::DataReplica,
                at(1),
            ));
            components.push(VmComponent::new(
                format!("{}-d2", vm_id),
                ComponentKind::DataReplica,
                at(2),
            ));
            components.push(VmComponent::new(
                format!("{}-w1", vm_id),
                ComponentKind::Witness,
                at(3),
            ));
        }

        components
    }
}
