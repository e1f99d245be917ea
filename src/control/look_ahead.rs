//! Adaptive tracking look-ahead.
//!
//! A longer look-ahead smooths commanded speeds, a shorter one reacts
//! faster.  The scaler only moves the value every `interval_cycles`
//! tracking cycles so the look-ahead itself does not oscillate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookAheadParams {
    /// Shortest look-ahead (s).
    pub floor: f64,
    /// Shortest look-ahead while commanded speed is low (s).
    pub low_speed_floor: f64,
    /// Longest look-ahead (s).
    pub ceiling: f64,
    /// Change per evaluation (s).
    pub step: f64,
    /// With erratic speed direction, look-ahead below this grows, above it
    /// shrinks (s).
    pub pivot: f64,
    /// Speed-direction stdev treated as erratic (deg).
    pub direction_stdev_limit: f64,
    /// Tracking cycles between evaluations.
    pub interval_cycles: u32,
    /// Consecutive low-speed cycles before the look-ahead grows.
    pub low_speed_cycles: u32,
}

impl Default for LookAheadParams {
    fn default() -> Self {
        Self {
            floor: 1.5,
            low_speed_floor: 2.5,
            ceiling: 15.0,
            step: 0.5,
            pivot: 4.0,
            direction_stdev_limit: 2.0,
            interval_cycles: 10,
            low_speed_cycles: 20,
        }
    }
}

/// Inputs of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAheadInputs {
    /// Stdev of the recent speed direction (deg).
    pub direction_stdev: f64,
    /// Consecutive cycles with low commanded speed.
    pub low_speed_cycles: u32,
    /// Commanded speed is low in this cycle.
    pub low_speed_now: bool,
}

#[derive(Debug, Clone)]
pub struct LookAheadScaler {
    params: LookAheadParams,
    cycles: u32,
}

impl LookAheadScaler {
    pub fn new(params: LookAheadParams) -> Self {
        Self { params, cycles: 0 }
    }

    pub fn params(&self) -> &LookAheadParams {
        &self.params
    }

    /// Count one tracking cycle and, on evaluation cycles, return the new
    /// look-ahead when it changes.
    pub fn scale(&mut self, current: f64, inputs: LookAheadInputs) -> Option<f64> {
        self.cycles += 1;
        if self.cycles < self.params.interval_cycles {
            return None;
        }
        self.cycles = 0;

        let p = &self.params;
        let next = if inputs.direction_stdev > p.direction_stdev_limit {
            if current < p.pivot {
                current + p.step
            } else {
                current - p.step
            }
        } else if inputs.low_speed_cycles >= p.low_speed_cycles {
            (current + p.step).min(p.ceiling)
        } else {
            let floor = if inputs.low_speed_now {
                p.low_speed_floor
            } else {
                p.floor
            };
            if current > floor {
                (current - p.step).max(floor)
            } else {
                current
            }
        };
        let next = next.max(p.floor).min(p.ceiling);

        if (next - current).abs() > f64::EPSILON {
            Some(next)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.cycles = 0;
    }
}
