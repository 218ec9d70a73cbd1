//! External data model: the consolidation planner borrows hosts and VMs through these traits
//! instead of owning concrete types. A discrete-event simulator supplies the implementations.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::error::PowerModelError;

/// A virtual machine, as seen by the planner. Implemented by the surrounding simulator.
pub trait Vm {
    /// Stable VM id.
    fn id(&self) -> u32;

    /// Total MIPS currently requested by the VM's workload.
    fn current_requested_total_mips(&self) -> f64;

    /// MIPS allocated to the VM on its current host.
    fn allocated_mips(&self) -> f64;

    /// IOPS allocated to the VM on its current host.
    fn allocated_iops(&self) -> f64;

    /// Whether the VM is currently in the middle of a live migration.
    fn is_in_migration(&self) -> bool;
}

/// Shared handle to a VM. Hosts and the planner both hold references to the same VM state.
pub type VmHandle = Rc<RefCell<dyn Vm>>;

/// A power model maps a host's CPU utilization fraction to its instantaneous power draw in watts.
///
/// Returns a typed error instead of a sentinel value so a failing computation can be told
/// apart from a host that is genuinely idle.
pub trait PowerModel: dyn_clone::DynClone {
    fn get_power(&self, time: f64, utilization: f64) -> Result<f64, PowerModelError>;
}

dyn_clone::clone_trait_object!(PowerModel);

/// A physical host, as seen by the planner. Implemented by the surrounding simulator.
pub trait Host {
    /// Stable host id.
    fn id(&self) -> u32;

    /// Total MIPS capacity of the host.
    fn total_mips(&self) -> f64;

    /// Power currently drawn by the host, in watts.
    fn current_power(&self) -> f64;

    /// The host's power model.
    fn power_model(&self) -> &dyn PowerModel;

    /// VMs currently resident on the host (running or migrating out), in no particular order.
    fn resident_vms(&self) -> Vec<VmHandle>;

    /// Ids of VMs that are migrating into this host.
    fn migrating_in_vm_ids(&self) -> HashSet<u32>;

    /// Whether the host could in principle run `vm` (capacity class, architecture, etc.).
    fn is_suitable_for_vm(&self, vm: &VmHandle) -> bool;

    /// Hypothetically or actually starts `vm` on this host. Returns `false` if the host
    /// refused the allocation (e.g. insufficient capacity).
    fn vm_create(&mut self, vm: VmHandle) -> bool;

    /// Removes `vm_id` from the host, if resident.
    fn vm_destroy(&mut self, vm_id: u32);

    /// Removes every resident VM from the host.
    fn vm_destroy_all(&mut self);

    /// Finalizes VMs that were migrating in, turning them into ordinary resident VMs.
    fn reallocate_migrating_in_vms(&mut self);

    /// Computes the host's power draw at the given hypothetical utilization.
    fn power(&self, time: f64, utilization: f64) -> Result<f64, PowerModelError> {
        self.power_model().get_power(time, utilization)
    }
}

/// Shared handle to a host.
pub type HostHandle = Rc<RefCell<dyn Host>>;
