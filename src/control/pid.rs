//! PID controller for tracking error correction.
//!
//! Fed directly with the positional error of one axis (counts) and the
//! time since the previous control cycle.  Output is a speed correction in
//! counts per second.

use serde::{Deserialize, Serialize};

/// Gain triple plus symmetric output limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Output is clamped to `±output_limit`.
    pub output_limit: f64,
}

impl PidGains {
    pub const fn new(kp: f64, ki: f64, kd: f64, output_limit: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            output_limit,
        }
    }
}

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    integral: f64,
    prev_error: f64,
    output_min: f64,
    output_max: f64,
}

impl PidController {
    pub fn new(gains: PidGains) -> Self {
        let mut pid = Self {
            kp: gains.kp,
            ki: gains.ki,
            kd: gains.kd,
            integral: 0.0,
            prev_error: 0.0,
            output_min: 0.0,
            output_max: 0.0,
        };
        pid.set_limits(-gains.output_limit.abs(), gains.output_limit.abs());
        pid
    }

    /// Set output limits
    pub fn set_limits(&mut self, min: f64, max: f64) {
        self.output_min = min;
        self.output_max = max;
    }

    pub fn gains(&self) -> PidGains {
        PidGains {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            output_limit: self.output_max,
        }
    }

    /// Compute the correction for `error` after `dt` seconds.
    pub fn compute(&mut self, error: f64, dt: f64) -> f64 {
        // Proportional
        let p = self.kp * error;

        // Integral (with anti-windup)
        self.integral += error * dt;
        let i = self.ki * self.integral;

        // Derivative
        let derivative = if dt > 0.0 {
            (error - self.prev_error) / dt
        } else {
            0.0
        };
        let d = self.kd * derivative;

        self.prev_error = error;

        let output = (p + i + d).max(self.output_min).min(self.output_max);

        // Saturated: undo this cycle's integration.
        if output >= self.output_max || output <= self.output_min {
            self.integral -= error * dt;
        }

        output
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}
