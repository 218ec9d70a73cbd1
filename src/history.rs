//! In-memory time-series traces recorded across consolidation passes.
//!
//! Persisting these traces to disk is the caller's concern (§1, out of scope); this module only
//! accumulates them for the lifetime of the process.

use std::collections::HashMap;
use std::time::Duration;

/// Per-host utilization/metric traces. The three sequences are kept parallel: appending to one
/// always appends to the other two in the same call (§3 I4, §8 P5).
#[derive(Default, Clone)]
pub struct HistoryTraces {
    pub time_history: Vec<f64>,
    pub utilization_history: Vec<f64>,
    pub metric_history: Vec<f64>,
}

/// Wall-clock timings for one `optimize()` invocation's phases.
#[derive(Default, Clone)]
pub struct PassTimings {
    pub host_selection_cpu: Vec<Duration>,
    pub host_selection_io: Vec<Duration>,
    pub vm_selection: Vec<Duration>,
    pub vm_reallocation: Vec<Duration>,
    pub total: Vec<Duration>,
}

/// Accumulates per-host and per-pass history across consolidation invocations.
#[derive(Default)]
pub struct HistoryRecorder {
    traces: HashMap<u32, HistoryTraces>,
    timings: PassTimings,
}

impl HistoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry to `host_id`'s traces at simulation clock `time`, unless an entry at
    /// that exact clock value already exists (per-clock idempotent, §4.7).
    pub fn add_history_entry(&mut self, host_id: u32, time: f64, cpu_utilization: f64, metric: f64) {
        let entry = self.traces.entry(host_id).or_default();
        if entry.time_history.last().copied() == Some(time) {
            return;
        }
        entry.time_history.push(time);
        entry.utilization_history.push(cpu_utilization);
        entry.metric_history.push(metric);
    }

    /// CPU utilization fraction samples recorded for `host_id`, oldest first.
    pub fn utilization_history(&self, host_id: u32) -> &[f64] {
        self.traces.get(&host_id).map(|t| t.utilization_history.as_slice()).unwrap_or(&[])
    }

    /// Full traces for `host_id`, if any have been recorded.
    pub fn traces(&self, host_id: u32) -> Option<&HistoryTraces> {
        self.traces.get(&host_id)
    }

    /// All host ids with at least one recorded entry.
    pub fn host_ids(&self) -> impl Iterator<Item = &u32> {
        self.traces.keys()
    }

    pub fn timings(&self) -> &PassTimings {
        &self.timings
    }

    pub(crate) fn record_host_selection_cpu(&mut self, d: Duration) {
        self.timings.host_selection_cpu.push(d);
    }

    pub(crate) fn record_host_selection_io(&mut self, d: Duration) {
        self.timings.host_selection_io.push(d);
    }

    pub(crate) fn record_vm_selection(&mut self, d: Duration) {
        self.timings.vm_selection.push(d);
    }

    pub(crate) fn record_vm_reallocation(&mut self, d: Duration) {
        self.timings.vm_reallocation.push(d);
    }

    pub(crate) fn record_total(&mut self, d: Duration) {
        self.timings.total.push(d);
    }
}
