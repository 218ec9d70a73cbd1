//! Power-aware, multi-resource VM consolidation planner.
//!
//! Detects hosts over- or under-utilized on two independent resource dimensions — compute
//! (MIPS) and storage I/O (IOPS) — selects VMs to evict from stressed hosts, and computes a
//! placement that relieves overload, drains under-utilized hosts for power-down, and minimizes
//! the incremental power drawn by the fleet.
//!
//! The planner borrows its fleet through the [`model::Host`] and [`model::Vm`] traits: it owns
//! no host or VM data of its own, only the per-pass snapshot, exclusion sets and utilization
//! history it accumulates across invocations.

pub mod config;
pub mod consolidator;
pub mod error;
pub mod eviction;
pub mod fleet_view;
pub mod history;
pub mod model;
pub mod overload;
pub mod placement;
pub mod power_model;
pub mod vm_selector;

#[cfg(test)]
mod testutil;

pub use config::ConsolidatorConfig;
pub use consolidator::{Consolidator, MigrationMap, Placement};
pub use error::{ConsolidationError, PowerModelError};
pub use model::{Host, HostHandle, PowerModel, Vm, VmHandle};
