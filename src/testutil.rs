//! Minimal `Host`/`Vm` fixtures used by unit tests across this crate.

#![cfg(test)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::error::PowerModelError;
use crate::model::{Host, HostHandle, PowerModel, Vm, VmHandle};
use crate::power_model::LinearPowerModel;

pub struct MockVm {
    pub id: u32,
    pub requested_mips: f64,
    pub allocated_mips: f64,
    pub allocated_iops: f64,
    pub in_migration: bool,
}

impl MockVm {
    pub fn new(id: u32, mips: f64, iops: f64) -> Self {
        Self {
            id,
            requested_mips: mips,
            allocated_mips: mips,
            allocated_iops: iops,
            in_migration: false,
        }
    }

    pub fn migrating(mut self) -> Self {
        self.in_migration = true;
        self
    }

    pub fn into_handle(self) -> VmHandle {
        Rc::new(RefCell::new(self))
    }
}

impl Vm for MockVm {
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

pub struct MockHost {
    pub id: u32,
    pub total_mips: f64,
    pub vms: Vec<VmHandle>,
    pub migrating_in: HashSet<u32>,
    pub suitable: bool,
    pub power_model: Box<dyn PowerModel>,
    pub current_power: f64,
    pub fail_create: bool,
}

impl MockHost {
    pub fn new(id: u32, total_mips: f64) -> Self {
        Self {
            id,
            total_mips,
            vms: Vec::new(),
            migrating_in: HashSet::new(),
            suitable: true,
            power_model: Box::new(LinearPowerModel::new(200.0)),
            current_power: 0.0,
            fail_create: false,
        }
    }

    pub fn into_handle(self) -> HostHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn mark_migrating_in(&mut self, vm_id: u32) {
        self.migrating_in.insert(vm_id);
    }

    pub fn unsuitable(mut self) -> Self {
        self.suitable = false;
        self
    }

    pub fn with_power_model(mut self, model: Box<dyn PowerModel>) -> Self {
        self.power_model = model;
        self
    }
}

#[derive(Clone)]
struct FailingPowerModel;

impl PowerModel for FailingPowerModel {
    fn get_power(&self, _time: f64, utilization: f64) -> Result<f64, PowerModelError> {
        Err(PowerModelError::ComputationFailed(utilization))
    }
}

pub fn failing_power_model() -> Box<dyn PowerModel> {
    Box::new(FailingPowerModel)
}

impl Host for MockHost {
    fn id(&self) -> u32 {
        self.id
    }
    fn total_mips(&self) -> f64 {
        self.total_mips
    }
    fn current_power(&self) -> f64 {
        self.current_power
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
        self.suitable
    }
    fn vm_create(&mut self, vm: VmHandle) -> bool {
        if self.fail_create {
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
