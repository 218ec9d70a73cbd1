//! Minimal `Host`/`Vm` fixtures for integration tests, duplicating `src/testutil.rs` at a
//! reduced surface since integration test binaries cannot see `#[cfg(test)]` library items.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use vm_consolidator::{Host, HostHandle, PowerModel, PowerModelError, Vm, VmHandle};

pub struct TestVm {
    pub id: u32,
    pub requested_mips: f64,
    pub allocated_mips: f64,
    pub allocated_iops: f64,
    pub in_migration: bool,
}

impl TestVm {
    pub fn new(id: u32, mips: f64, iops: f64) -> Self {
        Self {
            id,
            requested_mips: mips,
            allocated_mips: mips,
            allocated_iops: iops,
            in_migration: false,
        }
    }

    pub fn into_handle(self) -> VmHandle {
        Rc::new(RefCell::new(self))
    }
}

impl Vm for TestVm {
    fn id(&self) -> u32 {
        self.id
    }
    fn current_requested_total_mips(&self) -> f64 {
        self.requested_mips
    }
    fn allocated_mips(&self) -> f64 {
        self.allocated_mips
    }
    fn allocated_iops(&self) -> f64 {
        self.allocated_iops
    }
    fn is_in_migration(&self) -> bool {
        self.in_migration
    }
}

#[derive(Clone)]
pub struct LinearPower {
    pub max_power: f64,
}

impl PowerModel for LinearPower {
    fn get_power(&self, _time: f64, utilization: f64) -> Result<f64, PowerModelError> {
        if utilization <= 0.0 {
            return Ok(0.0);
        }
        Ok(self.max_power * (0.4 + 0.6 * utilization.min(1.0)))
    }
}

pub struct TestHost {
    pub id: u32,
    pub total_mips: f64,
    pub vms: Vec<VmHandle>,
    pub migrating_in: HashSet<u32>,
    pub power_model: Box<dyn PowerModel>,
}

impl TestHost {
    pub fn new(id: u32, total_mips: f64, max_power: f64) -> Self {
        Self {
            id,
            total_mips,
            vms: Vec::new(),
            migrating_in: HashSet::new(),
            power_model: Box::new(LinearPower { max_power }),
        }
    }

    pub fn into_handle(self) -> HostHandle {
        Rc::new(RefCell::new(self))
    }
}

impl Host for TestHost {
    fn id(&self) -> u32 {
        self.id
    }
    fn total_mips(&self) -> f64 {
        self.total_mips
    }
    fn current_power(&self) -> f64 {
        let used: f64 = self.vms.iter().map(|vm| vm.borrow().allocated_mips()).sum();
        self.power_model.get_power(0.0, used / self.total_mips).unwrap_or(0.0)
    }
    fn power_model(&self) -> &dyn PowerModel {
        self.power_model.as_ref()
    }
    fn resident_vms(&self) -> Vec<VmHandle> {
        self.vms.clone()
    }
    fn migrating_in_vm_ids(&self) -> HashSet<u32> {
        self.migrating_in.clone()
    }
    fn is_suitable_for_vm(&self, _vm: &VmHandle) -> bool {
        true
    }
    fn vm_create(&mut self, vm: VmHandle) -> bool {
        let used: f64 = self.vms.iter().map(|v| v.borrow().allocated_mips()).sum();
        if used + vm.borrow().allocated_mips() > self.total_mips {
            return false;
        }
        self.vms.retain(|v| v.borrow().id() != vm.borrow().id());
        self.vms.push(vm);
        true
    }
    fn vm_destroy(&mut self, vm_id: u32) {
        self.vms.retain(|vm| vm.borrow().id() != vm_id);
    }
    fn vm_destroy_all(&mut self) {
        self.vms.clear();
    }
    fn reallocate_migrating_in_vms(&mut self) {
        self.migrating_in.clear();
    }
}
