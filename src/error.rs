//! Typed errors for the consolidation planner.
//!
//! The source design this planner is modeled on terminates the process on configuration and
//! restore failures. This codebase surfaces both as typed, non-terminating errors instead —
//! the caller (the surrounding simulator) decides the shutdown policy.

use thiserror::Error;

/// Fatal errors produced by the consolidation planner.
#[derive(Debug, Error, PartialEq)]
pub enum ConsolidationError {
    /// `w_mips + w_iops` did not equal `1.0` (within epsilon) at construction time.
    #[error("invalid weights: w_mips ({w_mips}) + w_iops ({w_iops}) must equal 1.0")]
    ConfigInvalid { w_mips: f64, w_iops: f64 },

    /// Recreating a snapshotted (host, vm) pair during `restore_allocation` failed.
    /// The snapshot is known-good state; inability to reproduce it indicates corruption
    /// in the surrounding simulator's host model.
    #[error("failed to restore vm {vm_id} onto host {host_id}: host refused allocation")]
    RestoreFailed { host_id: u32, vm_id: u32 },
}

/// Recoverable failure of a `PowerModel` computation.
///
/// `find_host_for_vm` treats this as a local-recovery signal: the offending host is simply
/// excluded from consideration and the search continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PowerModelError {
    #[error("power model could not compute power for utilization {0}")]
    ComputationFailed(f64),
}
