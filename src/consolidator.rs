//! Top-level control loop: snapshot, detect overload, evict, place, drain, restore-or-commit.

use std::collections::HashSet;
use std::time::Instant;

use crate::config::ConsolidatorConfig;
use crate::error::ConsolidationError;
use crate::eviction::EvictionPlanner;
use crate::fleet_view::FleetView;
use crate::history::HistoryRecorder;
use crate::model::{HostHandle, VmHandle};
use crate::overload::OverloadDetector;
use crate::placement::PlacementSearch;
use crate::vm_selector::VmSelectionPolicy;

/// A single planned relocation: `vm` should run on `host`. A two-field record rather than a
/// string-keyed map.
#[derive(Clone)]
pub struct Placement {
    pub vm: VmHandle,
    pub host: HostHandle,
}

/// An ordered sequence of placements produced by one consolidation invocation.
pub type MigrationMap = Vec<Placement>;

/// Top-level consolidation planner.
///
/// Drives `EvictionPlanner` (itself backed by `OverloadDetector` + the injected
/// `VmSelectionPolicy` strategies) and then `PlacementSearch`, mutating a working copy of the
/// fleet and either committing the plan or rolling back to a snapshot taken at pass start.
pub struct Consolidator {
    fleet: FleetView,
    detector: OverloadDetector,
    cpu_selector: Box<dyn VmSelectionPolicy>,
    io_selector: Box<dyn VmSelectionPolicy>,
    config: ConsolidatorConfig,
    history: HistoryRecorder,
    saved_allocation: Vec<(HostHandle, VmHandle)>,
}

impl Consolidator {
    pub fn new(
        hosts: Vec<HostHandle>,
        cpu_selector: Box<dyn VmSelectionPolicy>,
        io_selector: Box<dyn VmSelectionPolicy>,
        detector: OverloadDetector,
        config: ConsolidatorConfig,
    ) -> Result<Self, ConsolidationError> {
        if (config.w_mips + config.w_iops - 1.0).abs() > 1e-9 {
            return Err(ConsolidationError::ConfigInvalid {
                w_mips: config.w_mips,
                w_iops: config.w_iops,
            });
        }
        Ok(Self {
            fleet: FleetView::new(hosts),
            detector,
            cpu_selector,
            io_selector,
            config,
            history: HistoryRecorder::new(),
            saved_allocation: Vec::new(),
        })
    }

    pub fn history(&self) -> &HistoryRecorder {
        &self.history
    }

    pub fn fleet(&self) -> &FleetView {
        &self.fleet
    }

    /// Runs one consolidation pass. `_vm_list` is accepted for interface parity with the design
    /// this planner is modeled on, which also does not consult it directly: the fleet's host
    /// residency, not a caller-supplied VM list, is the single source of truth for what needs
    /// migrating.
    pub fn optimize(&mut self, _vm_list: &[VmHandle], time: f64) -> Result<MigrationMap, ConsolidationError> {
        let pass_start = Instant::now();

        let t0 = Instant::now();
        let cpu_over = self.detector.over_utilized_hosts_cpu(&self.fleet, &self.history);
        self.history.record_host_selection_cpu(t0.elapsed());

        let t1 = Instant::now();
        let io_over = self.detector.over_utilized_hosts_io(&self.fleet, &self.history);
        self.history.record_host_selection_io(t1.elapsed());

        self.record_utilization_history(time);

        self.save_allocation();

        let t2 = Instant::now();
        let planner = EvictionPlanner::new(&self.detector, self.cpu_selector.as_ref(), self.io_selector.as_ref());
        let plan = planner.plan(
            &cpu_over,
            &io_over,
            &self.fleet,
            &self.history,
            self.config.w_mips,
            self.config.w_iops,
        );
        self.history.record_vm_selection(t2.elapsed());

        let t3 = Instant::now();
        let excluded: HashSet<u32> = cpu_over
            .iter()
            .chain(io_over.iter())
            .map(|h| h.borrow().id())
            .collect();
        let mut migration_map = self.place_overload_victims(plan.cpu_victims, plan.io_victims, &excluded, time);
        migration_map.extend(self.drain_under_utilized_hosts(&excluded, time));
        self.history.record_vm_reallocation(t3.elapsed());

        self.restore_allocation()?;

        self.history.record_total(pass_start.elapsed());
        Ok(migration_map)
    }

    /// Appends one history entry per host for this pass: CPU utilization fraction as the primary
    /// sample, current IOPS load as the paired detector metric.
    fn record_utilization_history(&mut self, time: f64) {
        for host in self.fleet.hosts() {
            let host_id = host.borrow().id();
            let total_mips = host.borrow().total_mips();
            let cpu_utilization = if total_mips > 0.0 {
                self.fleet.utilization_of_cpu_mips(host) / total_mips
            } else {
                0.0
            };
            let io_metric = self.fleet.utilization_of_iops(host);
            self.history.add_history_entry(host_id, time, cpu_utilization, io_metric);
        }
    }

    fn save_allocation(&mut self) {
        self.saved_allocation.clear();
        for host in self.fleet.hosts() {
            let migrating_in = host.borrow().migrating_in_vm_ids();
            for vm in host.borrow().resident_vms() {
                if !migrating_in.contains(&vm.borrow().id()) {
                    self.saved_allocation.push((host.clone(), vm));
                }
            }
        }
    }

    fn restore_allocation(&mut self) -> Result<(), ConsolidationError> {
        for host in self.fleet.hosts() {
            host.borrow_mut().vm_destroy_all();
        }
        for host in self.fleet.hosts() {
            host.borrow_mut().reallocate_migrating_in_vms();
        }
        for (host, vm) in &self.saved_allocation {
            if !host.borrow_mut().vm_create(vm.clone()) {
                return Err(ConsolidationError::RestoreFailed {
                    host_id: host.borrow().id(),
                    vm_id: vm.borrow().id(),
                });
            }
        }
        Ok(())
    }

    fn place_overload_victims(
        &self,
        mut cpu_victims: Vec<VmHandle>,
        mut io_victims: Vec<VmHandle>,
        excluded: &HashSet<u32>,
        time: f64,
    ) -> MigrationMap {
        cpu_victims.sort_by(|a, b| b.borrow().allocated_mips().partial_cmp(&a.borrow().allocated_mips()).unwrap());
        io_victims.sort_by(|a, b| b.borrow().allocated_iops().partial_cmp(&a.borrow().allocated_iops()).unwrap());

        let search = PlacementSearch::new(&self.detector);
        let mut map = MigrationMap::new();

        let place_list = |vms: Vec<VmHandle>, map: &mut MigrationMap| {
            for vm in vms {
                match search.find_host_for_vm(&vm, excluded, &self.fleet, &self.history, time) {
                    Some(host) => {
                        host.borrow_mut().vm_create(vm.clone());
                        map.push(Placement { vm, host });
                    }
                    None => {
                        log::debug!("no suitable target for overloaded vm {}, leaving stranded", vm.borrow().id());
                    }
                }
            }
        };

        if self.config.w_mips > self.config.w_iops {
            place_list(cpu_victims, &mut map);
            place_list(io_victims, &mut map);
        } else {
            place_list(io_victims, &mut map);
            place_list(cpu_victims, &mut map);
        }

        map
    }

    fn drain_under_utilized_hosts(&self, overload_union: &HashSet<u32>, time: f64) -> MigrationMap {
        let switched_off: HashSet<u32> = self.fleet.switched_off_hosts().iter().map(|h| h.borrow().id()).collect();
        let base: HashSet<u32> = overload_union.union(&switched_off).cloned().collect();
        // Grows with hosts already chosen as drain sources AND as placement targets.
        let mut exclude_under_search: HashSet<u32> = base.clone();
        // Grows only with hosts already chosen as drain sources: placement targets remain
        // eligible to receive further victims from later under-utilized hosts.
        let mut exclude_new_placement: HashSet<u32> = base;

        let search = PlacementSearch::new(&self.detector);
        let mut map = MigrationMap::new();

        loop {
            if exclude_under_search.len() == self.fleet.hosts().len() {
                break;
            }
            let Some(under) = self.under_utilized_host(&exclude_under_search) else {
                break;
            };
            let under_id = under.borrow().id();
            exclude_under_search.insert(under_id);
            exclude_new_placement.insert(under_id);

            let mut victims: Vec<VmHandle> = under
                .borrow()
                .resident_vms()
                .into_iter()
                .filter(|vm| !vm.borrow().is_in_migration())
                .collect();
            if victims.is_empty() {
                continue;
            }
            if self.config.w_mips > self.config.w_iops {
                victims.sort_by(|a, b| b.borrow().allocated_mips().partial_cmp(&a.borrow().allocated_mips()).unwrap());
            } else {
                victims.sort_by(|a, b| b.borrow().allocated_iops().partial_cmp(&a.borrow().allocated_iops()).unwrap());
            }

            let mut local_plan: Vec<Placement> = Vec::new();
            let mut all_placed = true;
            for victim in &victims {
                match search.find_host_for_vm(victim, &exclude_new_placement, &self.fleet, &self.history, time) {
                    Some(host) => {
                        host.borrow_mut().vm_create(victim.clone());
                        local_plan.push(Placement {
                            vm: victim.clone(),
                            host,
                        });
                    }
                    None => {
                        all_placed = false;
                        break;
                    }
                }
            }

            if all_placed {
                for placement in &local_plan {
                    exclude_under_search.insert(placement.host.borrow().id());
                }
                log::debug!("drained under-utilized host {} ({} vms)", under_id, local_plan.len());
                map.extend(local_plan);
            } else {
                log::debug!("aborting drain of host {}: not every vm had a target", under_id);
                for placement in local_plan {
                    placement.host.borrow_mut().vm_destroy(placement.vm.borrow().id());
                }
            }
        }

        map
    }

    /// Picks the host, among those not in `excluded`, with the smallest strictly-positive
    /// utilization on the weight-selected dimension, skipping hosts already in migration
    /// transition. Ties broken by fleet iteration order.
    fn under_utilized_host(&self, excluded: &HashSet<u32>) -> Option<HostHandle> {
        let use_cpu = self.config.w_mips > self.config.w_iops;
        let mut best: Option<(HostHandle, f64)> = None;

        for host in self.fleet.hosts() {
            let id = host.borrow().id();
            if excluded.contains(&id) {
                continue;
            }
            if Self::all_vms_migrating_out_or_any_vm_migrating_in(host) {
                continue;
            }
            let utilization = if use_cpu {
                let total = host.borrow().total_mips();
                if total == 0.0 {
                    continue;
                }
                self.fleet.utilization_of_cpu_mips(host) / total
            } else {
                self.fleet.utilization_of_iops(host)
            };
            if utilization <= 0.0 {
                continue;
            }
            match &best {
                Some((_, best_u)) if *best_u <= utilization => {}
                _ => best = Some((host.clone(), utilization)),
            }
        }

        best.map(|(h, _)| h)
    }

    fn all_vms_migrating_out_or_any_vm_migrating_in(host: &HostHandle) -> bool {
        let vms = host.borrow().resident_vms();
        if vms.is_empty() {
            return true;
        }
        if vms.iter().all(|vm| vm.borrow().is_in_migration()) {
            return true;
        }
        let migrating_in = host.borrow().migrating_in_vm_ids();
        vms.iter().any(|vm| migrating_in.contains(&vm.borrow().id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overload::StaticThresholdPredicate;
    use crate::testutil::{MockHost, MockVm};
    use crate::vm_selector::MaximumUsageVmSelector;

    fn consolidator(hosts: Vec<HostHandle>) -> Consolidator {
        let detector = OverloadDetector::new(
            Box::new(StaticThresholdPredicate::cpu(0.8)),
            Box::new(StaticThresholdPredicate::io(0.8)),
        );
        Consolidator::new(
            hosts,
            Box::new(MaximumUsageVmSelector),
            Box::new(MaximumUsageVmSelector),
            detector,
            ConsolidatorConfig::new(0.5, 0.5).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn optimize_appends_one_history_entry_per_host() {
        let h1 = MockHost::new(1, 1000.0).into_handle();
        let h2 = MockHost::new(2, 1000.0).into_handle();
        h1.borrow_mut().vm_create(MockVm::new(1, 200.0, 0.0).into_handle());
        let mut c = consolidator(vec![h1, h2]);

        c.optimize(&[], 10.0).unwrap();

        assert_eq!(c.history().utilization_history(1), &[0.2]);
        assert_eq!(c.history().utilization_history(2), &[0.0]);
    }

    #[test]
    fn idle_fleet_produces_empty_migration_map() {
        let h1 = MockHost::new(1, 1000.0).into_handle();
        let h2 = MockHost::new(2, 1000.0).into_handle();
        let mut c = consolidator(vec![h1, h2]);

        let migrations = c.optimize(&[], 0.0).unwrap();
        assert!(migrations.is_empty());
    }
}
