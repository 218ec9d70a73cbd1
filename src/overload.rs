//! Over-utilization detection: pluggable predicates plus a small standard library of them.

use crate::fleet_view::FleetView;
use crate::history::HistoryRecorder;
use crate::model::HostHandle;

/// A boolean predicate deciding whether a host is over-utilized on one dimension.
///
/// Implementations must be deterministic functions of the host's current observable state, so
/// that a `vm_destroy` followed by re-querying the predicate gives a sensible reading.
pub trait OverloadPredicate {
    fn is_over_utilized(&self, host: &HostHandle, fleet: &FleetView, history: &HistoryRecorder) -> bool;
}

/// Detects over-utilized hosts on the CPU and I/O dimensions using two injected predicates.
pub struct OverloadDetector {
    cpu_predicate: Box<dyn OverloadPredicate>,
    io_predicate: Box<dyn OverloadPredicate>,
}

impl OverloadDetector {
    pub fn new(cpu_predicate: Box<dyn OverloadPredicate>, io_predicate: Box<dyn OverloadPredicate>) -> Self {
        Self {
            cpu_predicate,
            io_predicate,
        }
    }

    pub fn is_host_over_utilized_cpu(&self, host: &HostHandle, fleet: &FleetView, history: &HistoryRecorder) -> bool {
        self.cpu_predicate.is_over_utilized(host, fleet, history)
    }

    pub fn is_host_over_utilized_io(&self, host: &HostHandle, fleet: &FleetView, history: &HistoryRecorder) -> bool {
        self.io_predicate.is_over_utilized(host, fleet, history)
    }

    /// Hosts from `fleet.hosts()` over-utilized on CPU, preserving fleet iteration order.
    pub fn over_utilized_hosts_cpu(&self, fleet: &FleetView, history: &HistoryRecorder) -> Vec<HostHandle> {
        fleet
            .hosts()
            .iter()
            .filter(|h| self.is_host_over_utilized_cpu(h, fleet, history))
            .cloned()
            .collect()
    }

    /// Hosts from `fleet.hosts()` over-utilized on I/O, preserving fleet iteration order.
    pub fn over_utilized_hosts_io(&self, fleet: &FleetView, history: &HistoryRecorder) -> Vec<HostHandle> {
        fleet
            .hosts()
            .iter()
            .filter(|h| self.is_host_over_utilized_io(h, fleet, history))
            .cloned()
            .collect()
    }

    /// Intersection of `cpu_list` and `io_list` by host identity, iterated in `io_list`'s order.
    pub fn common_over_utilized_hosts(&self, cpu_list: &[HostHandle], io_list: &[HostHandle]) -> Vec<HostHandle> {
        io_list
            .iter()
            .filter(|io_host| cpu_list.iter().any(|cpu_host| cpu_host.borrow().id() == io_host.borrow().id()))
            .cloned()
            .collect()
    }
}

/// Over-utilized iff current utilization exceeds a fixed threshold (default `0.8`).
pub struct StaticThresholdPredicate {
    threshold: f64,
    dimension: Dimension,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Dimension {
    Cpu,
    Io,
}

impl StaticThresholdPredicate {
    pub fn cpu(threshold: f64) -> Self {
        Self {
            threshold,
            dimension: Dimension::Cpu,
        }
    }

    pub fn io(threshold: f64) -> Self {
        Self {
            threshold,
            dimension: Dimension::Io,
        }
    }
}

impl OverloadPredicate for StaticThresholdPredicate {
    fn is_over_utilized(&self, host: &HostHandle, fleet: &FleetView, _history: &HistoryRecorder) -> bool {
        let utilization = match self.dimension {
            Dimension::Cpu => fleet.utilization_of_cpu_mips(host) / host.borrow().total_mips(),
            Dimension::Io => {
                let total_mips = host.borrow().total_mips();
                if total_mips == 0.0 {
                    return false;
                }
                fleet.utilization_of_iops(host) / total_mips
            }
        };
        utilization > self.threshold
    }
}

/// Over-utilized iff current utilization exceeds `median(history) + mad(history) * multiplier`.
/// Falls back to a static threshold while fewer than `MIN_SAMPLES` history points exist.
pub struct MadThresholdPredicate {
    multiplier: f64,
    fallback_threshold: f64,
}

const MIN_SAMPLES: usize = 4;

impl MadThresholdPredicate {
    pub fn new(multiplier: f64, fallback_threshold: f64) -> Self {
        Self {
            multiplier,
            fallback_threshold,
        }
    }
}

impl OverloadPredicate for MadThresholdPredicate {
    fn is_over_utilized(&self, host: &HostHandle, fleet: &FleetView, history: &HistoryRecorder) -> bool {
        let current = fleet.utilization_of_cpu_mips(host) / host.borrow().total_mips();
        let samples = history.utilization_history(host.borrow().id());
        if samples.len() < MIN_SAMPLES {
            return current > self.fallback_threshold;
        }
        let median = percentile(samples, 0.5);
        let deviations: Vec<f64> = samples.iter().map(|s| (s - median).abs()).collect();
        let mad = percentile(&deviations, 0.5);
        current > median + mad * self.multiplier
    }
}

/// Over-utilized iff current utilization exceeds `Q3 + iqr * multiplier`.
pub struct IqrThresholdPredicate {
    multiplier: f64,
    fallback_threshold: f64,
}

impl IqrThresholdPredicate {
    pub fn new(multiplier: f64, fallback_threshold: f64) -> Self {
        Self {
            multiplier,
            fallback_threshold,
        }
    }
}

impl OverloadPredicate for IqrThresholdPredicate {
    fn is_over_utilized(&self, host: &HostHandle, fleet: &FleetView, history: &HistoryRecorder) -> bool {
        let current = fleet.utilization_of_cpu_mips(host) / host.borrow().total_mips();
        let samples = history.utilization_history(host.borrow().id());
        if samples.len() < MIN_SAMPLES {
            return current > self.fallback_threshold;
        }
        let q1 = percentile(samples, 0.25);
        let q3 = percentile(samples, 0.75);
        current > q3 + (q3 - q1) * self.multiplier
    }
}

/// Linear-interpolated percentile over an unsorted sample slice.
fn percentile(samples: &[f64], p: f64) -> f64 {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + frac * (sorted[upper] - sorted[lower])
    }
}
