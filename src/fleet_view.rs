//! Read-only view over the fleet of hosts: iteration order and per-host utilization.

use crate::model::{HostHandle, VmHandle};

/// Ordered, read-mostly view over the fleet. Iteration order is the order hosts were supplied
/// at construction and is preserved by every helper below — it is what breaks ties throughout
/// the rest of the planner (§8, P8).
pub struct FleetView {
    hosts: Vec<HostHandle>,
}

impl FleetView {
    pub fn new(hosts: Vec<HostHandle>) -> Self {
        Self { hosts }
    }

    /// All hosts, in fleet iteration order.
    pub fn hosts(&self) -> &[HostHandle] {
        &self.hosts
    }

    /// Hosts with zero utilization on both dimensions. A host idle on CPU but still serving
    /// I/O is not considered switched off.
    pub fn switched_off_hosts(&self) -> Vec<HostHandle> {
        self.hosts
            .iter()
            .filter(|h| self.utilization_of_cpu_mips(h) == 0.0 && self.utilization_of_iops(h) == 0.0)
            .cloned()
            .collect()
    }

    /// Sum of allocated MIPS over resident VMs, inflated 10x for VMs migrating in to model the
    /// extra CPU the live-migration protocol itself consumes on the destination host.
    pub fn utilization_of_cpu_mips(&self, host: &HostHandle) -> f64 {
        let host_ref = host.borrow();
        let migrating_in = host_ref.migrating_in_vm_ids();
        host_ref
            .resident_vms()
            .iter()
            .map(|vm| {
                let allocated = vm.borrow().allocated_mips();
                if migrating_in.contains(&vm.borrow().id()) {
                    allocated + allocated * 9.0
                } else {
                    allocated
                }
            })
            .sum()
    }

    /// Sum of allocated IOPS over resident VMs. No migration-in inflation on this dimension.
    pub fn utilization_of_iops(&self, host: &HostHandle) -> f64 {
        host.borrow().resident_vms().iter().map(|vm| vm.borrow().allocated_iops()).sum()
    }

    /// Fleet-wide utilization ratio if `vm` were hypothetically allocated on `host`, in
    /// addition to its current resident load. May exceed 1.0; admissibility is the
    /// overload detector's call, not this view's.
    pub fn max_utilization_after_allocation(&self, host: &HostHandle, vm: &VmHandle) -> f64 {
        let total_mips = host.borrow().total_mips();
        (self.utilization_of_cpu_mips(host) + vm.borrow().current_requested_total_mips()) / total_mips
    }
}
