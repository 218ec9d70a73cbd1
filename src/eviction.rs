//! Eviction planning: decide which VMs must leave over-utilized hosts.

use crate::fleet_view::FleetView;
use crate::history::HistoryRecorder;
use crate::model::{HostHandle, VmHandle};
use crate::overload::{Dimension, OverloadDetector};
use crate::vm_selector::VmSelectionPolicy;

/// Result of one eviction pass: the VMs to evict to relieve CPU overload, and the VMs to evict
/// to relieve I/O overload. A named record rather than a positionally-indexed two-element list.
#[derive(Default)]
pub struct EvictionPlan {
    pub cpu_victims: Vec<VmHandle>,
    pub io_victims: Vec<VmHandle>,
}

/// Produces an `EvictionPlan` by simulated `vm_destroy` on the live host objects. Each
/// `vm_destroy` performed here is transient: the consolidator undoes it globally via
/// `restore_allocation` at the end of the pass.
pub struct EvictionPlanner<'a> {
    detector: &'a OverloadDetector,
    cpu_selector: &'a dyn VmSelectionPolicy,
    io_selector: &'a dyn VmSelectionPolicy,
}

impl<'a> EvictionPlanner<'a> {
    pub fn new(
        detector: &'a OverloadDetector,
        cpu_selector: &'a dyn VmSelectionPolicy,
        io_selector: &'a dyn VmSelectionPolicy,
    ) -> Self {
        Self {
            detector,
            cpu_selector,
            io_selector,
        }
    }

    pub fn plan(
        &self,
        cpu_over: &[HostHandle],
        io_over: &[HostHandle],
        fleet: &FleetView,
        history: &HistoryRecorder,
        w_mips: f64,
        w_iops: f64,
    ) -> EvictionPlan {
        let common = self.detector.common_over_utilized_hosts(cpu_over, io_over);
        let is_common = |h: &HostHandle| common.iter().any(|c| c.borrow().id() == h.borrow().id());
        let cpu_only: Vec<HostHandle> = cpu_over.iter().filter(|h| !is_common(h)).cloned().collect();
        let io_only: Vec<HostHandle> = io_over.iter().filter(|h| !is_common(h)).cloned().collect();

        let mut plan = EvictionPlan::default();

        if !common.is_empty() {
            if w_mips > w_iops {
                plan.cpu_victims
                    .extend(self.evict_until_relieved(&common, Dimension::Cpu, fleet, history));
                let still_io: Vec<HostHandle> = common
                    .iter()
                    .filter(|h| self.detector.is_host_over_utilized_io(h, fleet, history))
                    .cloned()
                    .collect();
                plan.io_victims
                    .extend(self.evict_until_relieved(&still_io, Dimension::Io, fleet, history));
            } else {
                plan.io_victims
                    .extend(self.evict_until_relieved(&common, Dimension::Io, fleet, history));
                let still_cpu: Vec<HostHandle> = common
                    .iter()
                    .filter(|h| self.detector.is_host_over_utilized_cpu(h, fleet, history))
                    .cloned()
                    .collect();
                plan.cpu_victims
                    .extend(self.evict_until_relieved(&still_cpu, Dimension::Cpu, fleet, history));
            }
        }

        plan.cpu_victims
            .extend(self.evict_until_relieved(&cpu_only, Dimension::Cpu, fleet, history));
        plan.io_victims
            .extend(self.evict_until_relieved(&io_only, Dimension::Io, fleet, history));

        plan
    }

    fn evict_until_relieved(
        &self,
        hosts: &[HostHandle],
        dim: Dimension,
        fleet: &FleetView,
        history: &HistoryRecorder,
    ) -> Vec<VmHandle> {
        let mut victims = Vec::new();
        let selector = match dim {
            Dimension::Cpu => self.cpu_selector,
            Dimension::Io => self.io_selector,
        };
        for host in hosts {
            loop {
                let still_over = match dim {
                    Dimension::Cpu => self.detector.is_host_over_utilized_cpu(host, fleet, history),
                    Dimension::Io => self.detector.is_host_over_utilized_io(host, fleet, history),
                };
                if !still_over {
                    break;
                }
                let Some(vm) = selector.select_vm_to_migrate(host, fleet) else {
                    log::debug!(
                        "host {} still over-utilized on {:?} but no eligible vm remains, giving up",
                        host.borrow().id(),
                        dim
                    );
                    break;
                };
                let vm_id = vm.borrow().id();
                host.borrow_mut().vm_destroy(vm_id);
                log::trace!("evicted vm {} from host {} ({:?} overload)", vm_id, host.borrow().id(), dim);
                victims.push(vm);
            }
        }
        victims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overload::StaticThresholdPredicate;
    use crate::testutil::{MockHost, MockVm};
    use crate::vm_selector::MaximumUsageVmSelector;

    #[test]
    fn evicts_until_host_no_longer_overloaded() {
        let host = MockHost::new(1, 1000.0).into_handle();
        host.borrow_mut().vm_create(MockVm::new(1, 500.0, 0.0).into_handle());
        host.borrow_mut().vm_create(MockVm::new(2, 500.0, 0.0).into_handle());
        let fleet = FleetView::new(vec![host.clone()]);
        let history = HistoryRecorder::new();
        let detector = OverloadDetector::new(
            Box::new(StaticThresholdPredicate::cpu(0.8)),
            Box::new(StaticThresholdPredicate::io(0.8)),
        );
        let cpu_selector = MaximumUsageVmSelector;
        let io_selector = MaximumUsageVmSelector;
        let planner = EvictionPlanner::new(&detector, &cpu_selector, &io_selector);

        let plan = planner.plan(&[host.clone()], &[], &fleet, &history, 0.7, 0.3);
        assert_eq!(plan.cpu_victims.len(), 1);
        assert!(!detector.is_host_over_utilized_cpu(&host, &fleet, &history));
    }

    #[test]
    fn common_host_cpu_first_when_cpu_weight_dominates() {
        let host = MockHost::new(1, 1000.0).into_handle();
        host.borrow_mut().vm_create(MockVm::new(1, 900.0, 900.0).into_handle());
        let fleet = FleetView::new(vec![host.clone()]);
        let history = HistoryRecorder::new();
        let detector = OverloadDetector::new(
            Box::new(StaticThresholdPredicate::cpu(0.8)),
            Box::new(StaticThresholdPredicate::io(0.8)),
        );
        let cpu_selector = MaximumUsageVmSelector;
        let io_selector = MaximumUsageVmSelector;
        let planner = EvictionPlanner::new(&detector, &cpu_selector, &io_selector);

        let plan = planner.plan(&[host.clone()], &[host.clone()], &fleet, &history, 0.7, 0.3);
        // The single vm relieves both dimensions in the cpu pass; the io pass finds nothing left.
        assert_eq!(plan.cpu_victims.len(), 1);
        assert_eq!(plan.io_victims.len(), 0);
    }
}
