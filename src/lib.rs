//! ClusterLab - a training simulator for a hyper-converged storage cluster.
//!
//! ClusterLab models the control plane of a vSAN-style cluster end to end:
//! building the cluster from an inventory of hosts, claiming disks into
//! cache/capacity tiers or a storage pool, deploying a VM fleet under a
//! storage policy, and then exercising the operational workflows an
//! administrator trains on: failures, recoveries, maintenance windows,
//! upgrades, and load balancing. Everything is deterministic; the only
//! nondeterminism is wall-clock timing, and even that is behind a clock
//! trait so tests run instantly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ClusterLab                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Facade: Simulator (commands, queries, event stream)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Workflows: Failure | Recovery | Maintenance | Balancing    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Core: Topology | Validation | Placement | Health | Ledger  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use clusterlab::config::ClusterLabConfig;
//! use clusterlab::simulator::Simulator;
//! use clusterlab::types::{DiskRole, StoragePolicy};
//!
//! #[tokio::main]
//! async fn main() -> clusterlab::Result<()> {
//!     let mut sim = Simulator::new(ClusterLabConfig::development());
//!     sim.create_cluster()?;
//!     sim.add_hosts(&["h1", "h2", "h3"])?;
//!     for i in 1..=3 {
//!         let host = format!("h{}", i);
//!         sim.toggle_traffic(&host)?;
//!         sim.claim_disk(&host, &format!("naa.500{}", i), DiskRole::Cache)?;
//!         sim.claim_disk(&host, &format!("naa.600{}1", i), DiskRole::Capacity)?;
//!     }
//!     sim.deploy_vsan()?;
//!     sim.deploy_vms(StoragePolicy::Raid1Ftt1)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod types;

pub mod capacity;
pub mod clock;
pub mod cluster;
pub mod events;
pub mod health;
pub mod observability;
pub mod simulator;
pub mod topology;
pub mod validation;

// Re-exports
pub use error::{ClusterLabError, Result};
pub use simulator::Simulator;
pub use types::*;
