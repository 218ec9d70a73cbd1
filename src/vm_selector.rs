//! VM eviction candidate selection: pluggable per-dimension policies plus a standard library.

use rand::seq::SliceRandom;

use crate::fleet_view::FleetView;
use crate::model::{HostHandle, VmHandle};

/// Chooses the next VM to evict from a stressed host, or `None` if no eligible VM remains
/// (e.g. every resident VM is already migrating).
pub trait VmSelectionPolicy {
    fn select_vm_to_migrate(&self, host: &HostHandle, fleet: &FleetView) -> Option<VmHandle>;
}

fn eligible_vms(host: &HostHandle) -> Vec<VmHandle> {
    host.borrow()
        .resident_vms()
        .into_iter()
        .filter(|vm| !vm.borrow().is_in_migration())
        .collect()
}

/// Picks the eligible VM with the greatest allocated MIPS — evict the heaviest offender first.
/// Stands in for the source design's "maximum correlation" CPU-selector policy, which requires
/// per-VM utilization correlation history this model does not track.
pub struct MaximumUsageVmSelector;

impl VmSelectionPolicy for MaximumUsageVmSelector {
    fn select_vm_to_migrate(&self, host: &HostHandle, _fleet: &FleetView) -> Option<VmHandle> {
        eligible_vms(host)
            .into_iter()
            .max_by(|a, b| a.borrow().allocated_mips().partial_cmp(&b.borrow().allocated_mips()).unwrap())
    }
}

/// Picks the eligible VM with the smallest allocated MIPS, a proxy for migration payload size
/// (memory footprint is outside this model's scope) — the quickest VM to move off the host.
pub struct MinimumMigrationTimeVmSelector;

impl VmSelectionPolicy for MinimumMigrationTimeVmSelector {
    fn select_vm_to_migrate(&self, host: &HostHandle, _fleet: &FleetView) -> Option<VmHandle> {
        eligible_vms(host)
            .into_iter()
            .min_by(|a, b| a.borrow().allocated_mips().partial_cmp(&b.borrow().allocated_mips()).unwrap())
    }
}

/// Picks uniformly among eligible VMs.
pub struct RandomVmSelector;

impl VmSelectionPolicy for RandomVmSelector {
    fn select_vm_to_migrate(&self, host: &HostHandle, _fleet: &FleetView) -> Option<VmHandle> {
        let vms = eligible_vms(host);
        vms.choose(&mut rand::thread_rng()).cloned()
    }
}

/// I/O-dimension selector: scores each eligible VM as `w_mips * allocated_mips + w_iops *
/// allocated_iops` and evicts the maximum, so both of the weighted dimensions have a say in
/// which VM leaves an I/O-overloaded host.
pub struct WeightedScoreVmSelector {
    w_mips: f64,
    w_iops: f64,
}

impl WeightedScoreVmSelector {
    pub fn new(w_mips: f64, w_iops: f64) -> Self {
        Self { w_mips, w_iops }
    }

    fn score(&self, vm: &VmHandle) -> f64 {
        let vm_ref = vm.borrow();
        self.w_mips * vm_ref.allocated_mips() + self.w_iops * vm_ref.allocated_iops()
    }
}

impl VmSelectionPolicy for WeightedScoreVmSelector {
    fn select_vm_to_migrate(&self, host: &HostHandle, _fleet: &FleetView) -> Option<VmHandle> {
        eligible_vms(host)
            .into_iter()
            .max_by(|a, b| self.score(a).partial_cmp(&self.score(b)).unwrap())
    }
}
