//! Placement search: find the lowest-power-increment suitable host for a VM.

use std::collections::HashSet;

use crate::fleet_view::FleetView;
use crate::history::HistoryRecorder;
use crate::model::{HostHandle, VmHandle};
use crate::overload::OverloadDetector;

/// Finds the best candidate host for a VM: the lowest power increment among hosts that are
/// suitable and would not become over-utilized after the hypothetical allocation.
pub struct PlacementSearch<'a> {
    detector: &'a OverloadDetector,
}

impl<'a> PlacementSearch<'a> {
    pub fn new(detector: &'a OverloadDetector) -> Self {
        Self { detector }
    }

    /// Scans `fleet.hosts()` in order, skipping hosts in `excluded`. Ties on power increment are
    /// broken by earliest fleet iteration order (§8, P8).
    pub fn find_host_for_vm(
        &self,
        vm: &VmHandle,
        excluded: &HashSet<u32>,
        fleet: &FleetView,
        history: &HistoryRecorder,
        time: f64,
    ) -> Option<HostHandle> {
        let mut best: Option<(HostHandle, f64)> = None;

        for host in fleet.hosts() {
            let host_id = host.borrow().id();
            if excluded.contains(&host_id) {
                continue;
            }
            if !host.borrow().is_suitable_for_vm(vm) {
                continue;
            }
            if self.would_overload_after_allocation(host, vm, fleet, history) {
                continue;
            }

            let utilization_after = fleet.max_utilization_after_allocation(host, vm);
            let power_after = match host.borrow().power(time, utilization_after) {
                Ok(p) => p,
                Err(err) => {
                    log::debug!("power model failed for host {}: {}, skipping", host_id, err);
                    continue;
                }
            };
            let delta = power_after - host.borrow().current_power();

            match &best {
                Some((_, best_delta)) if *best_delta <= delta => {}
                _ => best = Some((host.clone(), delta)),
            }
        }

        best.map(|(host, _)| host)
    }

    /// Hypothetically allocates `vm` on `host` and asks whether it would then be over-utilized
    /// on either dimension. Only applied to hosts already carrying load on both dimensions — an
    /// entirely idle host is always considered, since it cannot be pushed into overload by one
    /// more VM relative to its own empty baseline in the same way a partially loaded host can.
    fn would_overload_after_allocation(
        &self,
        host: &HostHandle,
        vm: &VmHandle,
        fleet: &FleetView,
        history: &HistoryRecorder,
    ) -> bool {
        let cpu_util = fleet.utilization_of_cpu_mips(host);
        let io_util = fleet.utilization_of_iops(host);
        if !(cpu_util > 0.0 && io_util > 0.0) {
            return false;
        }

        let created = host.borrow_mut().vm_create(vm.clone());
        if !created {
            return true;
        }
        let overloaded = self.detector.is_host_over_utilized_cpu(host, fleet, history)
            || self.detector.is_host_over_utilized_io(host, fleet, history);
        host.borrow_mut().vm_destroy(vm.borrow().id());
        overloaded
    }
}
