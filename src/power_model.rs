//! Standard power models.

use crate::error::PowerModelError;
use crate::model::PowerModel;

/// Simple linear power model.
///
/// Computes host power consumption (relative to a fully loaded host) as
/// `idle_power + utilization * (host_power - idle_power)`.
///
/// If utilization is zero, the host is assumed powered off and draws zero watts.
#[derive(Clone)]
pub struct LinearPowerModel {
    host_power: f64,
    idle_power: f64,
}

impl LinearPowerModel {
    /// `host_power` - power draw when fully loaded.
    pub fn new(host_power: f64) -> Self {
        Self {
            idle_power: host_power * 0.4,
            host_power,
        }
    }

    pub fn new_with_idle_power(host_power: f64, idle_power: f64) -> Self {
        Self { idle_power, host_power }
    }
}

impl PowerModel for LinearPowerModel {
    fn get_power(&self, _time: f64, utilization: f64) -> Result<f64, PowerModelError> {
        if utilization <= 0. {
            return Ok(0.);
        }
        let factor = self.host_power - self.idle_power;
        Ok(self.idle_power + utilization.min(1.0) * factor)
    }
}

/// Power model backed by a small number of (utilization, power) measurement points,
/// linearly interpolated between the two nearest samples. Useful when a host's actual
/// power curve was measured rather than assumed linear.
#[derive(Clone)]
pub struct InterpolatedPowerModel {
    // Sorted ascending by utilization; first point's utilization must be 0.0.
    points: Vec<(f64, f64)>,
}

impl InterpolatedPowerModel {
    /// `points` must be non-empty and sorted ascending by utilization fraction.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        assert!(!points.is_empty(), "power curve must have at least one point");
        Self { points }
    }
}

impl PowerModel for InterpolatedPowerModel {
    fn get_power(&self, _time: f64, utilization: f64) -> Result<f64, PowerModelError> {
        let u = utilization.clamp(0.0, 1.0);
        if self.points.len() == 1 {
            return Ok(self.points[0].1);
        }
        for window in self.points.windows(2) {
            let (u0, p0) = window[0];
            let (u1, p1) = window[1];
            if u >= u0 && u <= u1 {
                if (u1 - u0).abs() < f64::EPSILON {
                    return Ok(p1);
                }
                let t = (u - u0) / (u1 - u0);
                return Ok(p0 + t * (p1 - p0));
            }
        }
        // utilization beyond the last sample: clamp to the last point.
        Ok(self.points.last().unwrap().1)
    }
}
