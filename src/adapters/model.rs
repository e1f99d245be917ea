//! Standalone sky model for the daemon.
//!
//! Without an observatory astrometry stack the daemon follows a target
//! that moves at a constant rate in motor counts, and checks moves
//! against the configured soft limits only.

use crate::app::ports::{
    EphemerisError, EphemerisPort, Prediction, TrajectoryPort, TrajectoryVerdict,
};
use crate::config::{CountLimits, MountConfig};
use crate::protocol::Axes;

// ───────────────────────────────────────────────────────────────
// Constant-rate ephemeris
// ───────────────────────────────────────────────────────────────

/// Target at `start` counts at `epoch`, moving at `rate` counts/s.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRateModel {
    pub start: Axes<i32>,
    pub rate: Axes<f64>,
    /// Unix seconds.
    pub epoch: f64,
    /// Lowest X count considered above the horizon.
    pub horizon: Option<i32>,
    ticks_per_circle: Axes<i32>,
    limits: Axes<CountLimits>,
}

impl ConstantRateModel {
    pub fn new(start: Axes<i32>, rate: Axes<f64>, epoch: f64, config: &MountConfig) -> Self {
        Self {
            start,
            rate,
            epoch,
            horizon: None,
            ticks_per_circle: config.ticks_per_circle,
            limits: config.soft_limits,
        }
    }

    /// Target counts at `utc`, unrounded.
    pub fn position_at(&self, utc: f64) -> Axes<f64> {
        let dt = utc - self.epoch;
        Axes::new(
            f64::from(self.start.x) + self.rate.x * dt,
            f64::from(self.start.y) + self.rate.y * dt,
        )
    }
}

impl EphemerisPort for ConstantRateModel {
    fn predict(
        &mut self,
        utc: f64,
        current: Axes<i32>,
        look_ahead: f64,
    ) -> Result<Prediction, EphemerisError> {
        let now = self.position_at(utc);
        let ahead = self.position_at(utc + look_ahead);
        let target = Axes::new(ahead.x.round() as i32, ahead.y.round() as i32);

        if let Some(horizon) = self.horizon {
            if now.x < f64::from(horizon) {
                return Err(EphemerisError::BelowHorizon);
            }
        }
        if !self.limits.x.contains(target.x) || !self.limits.y.contains(target.y) {
            return Err(EphemerisError::Unreachable);
        }

        let error = Axes::new(
            now.x - f64::from(current.x),
            now.y - f64::from(current.y),
        );
        let error_deg = Axes::new(
            error.x * 360.0 / f64::from(self.ticks_per_circle.x),
            error.y * 360.0 / f64::from(self.ticks_per_circle.y),
        );

        Ok(Prediction {
            target,
            speed: self.rate,
            error,
            speed_angle: self.rate.y.atan2(self.rate.x).to_degrees(),
            error_angle: error.y.atan2(error.x).to_degrees(),
            target_distance: error_deg.x.hypot(error_deg.y),
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Soft-limit trajectory checker
// ───────────────────────────────────────────────────────────────

/// Refuses targets outside the soft limits and asks for a soft stop when
/// the move, continued for the whole window, would run past them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftLimitChecker {
    limits: Axes<CountLimits>,
}

impl SoftLimitChecker {
    pub fn new(limits: Axes<CountLimits>) -> Self {
        Self { limits }
    }
}

impl TrajectoryPort for SoftLimitChecker {
    fn check(
        &mut self,
        _utc: f64,
        current: Axes<i32>,
        target: Axes<i32>,
        rates: Axes<f64>,
        window: f64,
    ) -> TrajectoryVerdict {
        if !self.limits.x.contains(target.x) || !self.limits.y.contains(target.y) {
            return TrajectoryVerdict::Unsafe;
        }
        let overruns = |cur: i32, goal: i32, rate: f64, limits: &CountLimits| {
            let direction = (i64::from(goal) - i64::from(cur)).signum() as f64;
            let projected = f64::from(cur) + direction * rate.abs() * window;
            projected < f64::from(limits.min) || projected > f64::from(limits.max)
        };
        if overruns(current.x, target.x, rates.x, &self.limits.x)
            || overruns(current.y, target.y, rates.y, &self.limits.y)
        {
            TrajectoryVerdict::SoftStop
        } else {
            TrajectoryVerdict::Clear
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Combined model
// ───────────────────────────────────────────────────────────────

/// Both collaborators behind one value, as the service expects.
#[derive(Debug, Clone, PartialEq)]
pub struct StandaloneModel {
    pub ephemeris: ConstantRateModel,
    pub checker: SoftLimitChecker,
}

impl StandaloneModel {
    /// Follow a target moving at `rate` from `start`, checked against the
    /// soft limits of `config`.
    pub fn new(start: Axes<i32>, rate: Axes<f64>, epoch: f64, config: &MountConfig) -> Self {
        Self {
            ephemeris: ConstantRateModel::new(start, rate, epoch, config),
            checker: SoftLimitChecker::new(config.soft_limits),
        }
    }
}

impl EphemerisPort for StandaloneModel {
    fn predict(
        &mut self,
        utc: f64,
        current: Axes<i32>,
        look_ahead: f64,
    ) -> Result<Prediction, EphemerisError> {
        self.ephemeris.predict(utc, current, look_ahead)
    }
}

impl TrajectoryPort for StandaloneModel {
    fn check(
        &mut self,
        utc: f64,
        current: Axes<i32>,
        target: Axes<i32>,
        rates: Axes<f64>,
        window: f64,
    ) -> TrajectoryVerdict {
        self.checker.check(utc, current, target, rates, window)
    }
}
