//! Mock sky model and event recorder.
//!
//! `MockSky` serves a target moving at a constant rate in counts and
//! answers trajectory checks from a script.  Every check is recorded.

use std::collections::VecDeque;

use sitech::app::events::MountEvent;
use sitech::app::ports::{
    EphemerisError, EphemerisPort, EventSink, Prediction, TrajectoryPort, TrajectoryVerdict,
};
use sitech::protocol::Axes;

/// Arguments of one trajectory check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Check {
    pub current: Axes<i32>,
    pub target: Axes<i32>,
    pub rates: Axes<f64>,
    pub window: f64,
}

#[allow(dead_code)]
pub struct MockSky {
    base: Axes<f64>,
    base_time: f64,
    pub rate: Axes<f64>,
    pub ticks_per_circle: f64,
    pub failure: Option<EphemerisError>,
    /// Error estimates served instead of the computed ones.
    pub errors: VecDeque<Axes<f64>>,
    /// Verdicts served in order; `Clear` once empty.
    pub verdicts: VecDeque<TrajectoryVerdict>,
    pub checks: Vec<Check>,
}

#[allow(dead_code)]
impl MockSky {
    pub fn fixed(x: i32, y: i32) -> Self {
        Self {
            base: Axes::new(f64::from(x), f64::from(y)),
            base_time: 0.0,
            rate: Axes::new(0.0, 0.0),
            ticks_per_circle: 16_777_216.0,
            failure: None,
            errors: VecDeque::new(),
            verdicts: VecDeque::new(),
            checks: Vec::new(),
        }
    }

    pub fn moving(x: i32, y: i32, rate: Axes<f64>) -> Self {
        Self {
            rate,
            ..Self::fixed(x, y)
        }
    }

    pub fn position_at(&self, utc: f64) -> Axes<f64> {
        let dt = utc - self.base_time;
        Axes::new(self.base.x + self.rate.x * dt, self.base.y + self.rate.y * dt)
    }

    /// Change the rate from `utc` on without moving the target.
    pub fn set_rate(&mut self, utc: f64, rate: Axes<f64>) {
        self.base = self.position_at(utc);
        self.base_time = utc;
        self.rate = rate;
    }

    /// Jump the target to a new position.
    pub fn jump_to(&mut self, utc: f64, x: i32, y: i32) {
        self.base = Axes::new(f64::from(x), f64::from(y));
        self.base_time = utc;
    }
}

impl EphemerisPort for MockSky {
    fn predict(
        &mut self,
        utc: f64,
        current: Axes<i32>,
        look_ahead: f64,
    ) -> Result<Prediction, EphemerisError> {
        if let Some(e) = self.failure {
            return Err(e);
        }
        let now = self.position_at(utc);
        let ahead = self.position_at(utc + look_ahead);
        let error = self.errors.pop_front().unwrap_or(Axes::new(
            now.x - f64::from(current.x),
            now.y - f64::from(current.y),
        ));
        let deg = 360.0 / self.ticks_per_circle;
        Ok(Prediction {
            target: Axes::new(ahead.x.round() as i32, ahead.y.round() as i32),
            speed: self.rate,
            error,
            speed_angle: self.rate.y.atan2(self.rate.x).to_degrees(),
            error_angle: error.y.atan2(error.x).to_degrees(),
            target_distance: (error.x * deg).hypot(error.y * deg),
        })
    }
}

impl TrajectoryPort for MockSky {
    fn check(
        &mut self,
        _utc: f64,
        current: Axes<i32>,
        target: Axes<i32>,
        rates: Axes<f64>,
        window: f64,
    ) -> TrajectoryVerdict {
        self.checks.push(Check {
            current,
            target,
            rates,
            window,
        });
        self.verdicts.pop_front().unwrap_or(TrajectoryVerdict::Clear)
    }
}

/// Sink keeping every event.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<MountEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&MountEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &MountEvent) {
        self.events.push(event.clone());
    }
}
