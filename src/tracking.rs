//! Closed-loop tracking engine.
//!
//! One [`run_tracking_step`](TrackingEngine::run_tracking_step) is one
//! control cycle:
//!
//! ```text
//!  status ──▶ faults ──▶ predict ──▶ feed-forward + PID ──▶ cap ──▶ clamp
//!                                                                    │
//!        bookkeeping ◀── XR request ◀── motor units ◀── trajectory ◀─┘
//! ```
//!
//! The engine never owns the link or its collaborators.  They are passed
//! in on every call so the owning service can borrow the link for
//! out-of-band commands between cycles.

use log::{debug, error, info, warn};

use crate::app::events::{MountEvent, TrackingTelemetry};
use crate::app::ports::{EphemerisPort, EventSink, TrajectoryPort, TrajectoryVerdict};
use crate::config::MountConfig;
use crate::control::{
    LookAheadInputs, LookAheadScaler, OscillationState, OscillationTransition, PidController,
    Statistics,
};
use crate::error::TrackingError;
use crate::link::{ControllerGeneration, SitechLink, Transport};
use crate::protocol::request::XBIT_TRACKING;
use crate::protocol::{Axes, Axis, AxisStatus, MotionRequest, XAxisRequest};
use crate::safety::{FaultSupervisor, LatchTransition};

/// Length of every statistics window kept by the engine.
pub const STATS_WINDOW: usize = 16;

/// Diagnostic state of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisHealth {
    #[default]
    Good,
    /// Oscillation gains are engaged.
    Warning,
}

/// Outcome of one successful tracking cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Status frame returned as acknowledgement of the request.
    pub status: AxisStatus,
    pub request: XAxisRequest,
    /// Counts/s derived from the predicted target motion.
    pub feed_forward: Axes<f64>,
    /// Counts/s from the PID, after capping.
    pub correction: Axes<f64>,
    /// Commanded counts/s before the speed factor.
    pub speed: Axes<f64>,
    pub look_ahead: f64,
    pub target_distance: f64,
    /// The trajectory checker asked for a soft stop and the move was sent
    /// anyway.
    pub truncated: bool,
}

// ───────────────────────────────────────────────────────────────
// Per-axis loop state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct AxisLoop {
    tracking_pid: PidController,
    oscillation_pid: PidController,
    oscillation: OscillationState,
    errors: Statistics<STATS_WINDOW>,
    health: AxisHealth,
}

impl AxisLoop {
    fn new(config: &MountConfig) -> Self {
        Self {
            tracking_pid: PidController::new(config.tracking_pid),
            oscillation_pid: PidController::new(config.oscillation_pid),
            oscillation: OscillationState::new(
                config.oscillation_threshold,
                config.oscillation_min_samples,
            ),
            errors: Statistics::new(),
            health: AxisHealth::Good,
        }
    }

    fn active_pid(&mut self) -> &mut PidController {
        if self.oscillation.is_engaged() {
            &mut self.oscillation_pid
        } else {
            &mut self.tracking_pid
        }
    }

    fn reset(&mut self) {
        self.tracking_pid.reset();
        self.oscillation_pid.reset();
        self.oscillation.reset();
        self.errors.clear();
        self.health = AxisHealth::Good;
    }
}

// ───────────────────────────────────────────────────────────────
// TrackingEngine
// ───────────────────────────────────────────────────────────────

pub struct TrackingEngine {
    config: MountConfig,
    axes: Axes<AxisLoop>,
    faults: FaultSupervisor,

    look_ahead: f64,
    pinned: bool,
    scaler: LookAheadScaler,

    /// Predicted counts of the previous cycle.
    previous: Option<Axes<i32>>,
    last_loop: Option<f64>,
    cycles: u64,

    /// Commanded speed magnitude (deg/s).
    speed_stats: Statistics<STATS_WINDOW>,
    speed_angle_stats: Statistics<STATS_WINDOW>,
    error_angle_stats: Statistics<STATS_WINDOW>,
    low_speed_cycles: u32,

    x_bits: u8,
    y_bits: u8,
}

impl TrackingEngine {
    pub fn new(config: &MountConfig) -> Self {
        Self {
            axes: Axes::new(AxisLoop::new(config), AxisLoop::new(config)),
            faults: FaultSupervisor::new(),
            look_ahead: config.tracking_look_ahead_secs,
            pinned: config.look_ahead_pinned,
            scaler: LookAheadScaler::new(config.look_ahead),
            previous: None,
            last_loop: None,
            cycles: 0,
            speed_stats: Statistics::new(),
            speed_angle_stats: Statistics::new(),
            error_angle_stats: Statistics::new(),
            low_speed_cycles: 0,
            x_bits: 0,
            y_bits: 0,
            config: config.clone(),
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    /// Current tracking look-ahead (s).
    pub fn look_ahead(&self) -> f64 {
        self.look_ahead
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Pin the look-ahead to a fixed value, or release it to the adaptive
    /// scaler with `None`.
    pub fn pin_look_ahead(&mut self, value: Option<f64>) {
        match value {
            Some(v) => {
                let la = &self.config.look_ahead;
                self.look_ahead = v.max(la.floor).min(la.ceiling);
                self.pinned = true;
                info!("look-ahead pinned at {:.1} s", self.look_ahead);
            }
            None => {
                self.pinned = false;
                self.scaler.reset();
                info!("look-ahead adaptive from {:.1} s", self.look_ahead);
            }
        }
    }

    pub fn axis_health(&self, axis: Axis) -> AxisHealth {
        self.axes.get(axis).health
    }

    /// Oscillation gains are active on `axis`.
    pub fn oscillation_engaged(&self, axis: Axis) -> bool {
        self.axes.get(axis).oscillation.is_engaged()
    }

    pub fn faults(&self) -> &FaultSupervisor {
        &self.faults
    }

    /// True while the controller reports a fault on any axis.
    pub fn hardware_error(&self) -> bool {
        self.faults.hardware_error()
    }

    /// X bits sent with the next request.
    pub fn x_bits(&self) -> u8 {
        self.x_bits
    }

    /// Completed tracking cycles since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Forget loop history before a new tracking run.  Fault latches and
    /// the look-ahead survive.
    pub fn reset(&mut self) {
        self.axes.x.reset();
        self.axes.y.reset();
        self.scaler.reset();
        self.previous = None;
        self.last_loop = None;
        self.cycles = 0;
        self.speed_stats.clear();
        self.speed_angle_stats.clear();
        self.error_angle_stats.clear();
        self.low_speed_cycles = 0;
    }

    /// Forget latched faults after the controller errors were reset.
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    // ── Fault supervision ─────────────────────────────────────

    /// Run the fault supervisor over a status frame.  Fails when an axis
    /// sits on a limit switch.
    pub fn observe_status(
        &mut self,
        status: &AxisStatus,
        generation: &ControllerGeneration,
        sink: &mut impl EventSink,
    ) -> Result<(), TrackingError> {
        let report = self.faults.evaluate(status, generation);
        for (axis, transition) in report.transitions() {
            match transition {
                LatchTransition::Raised(word) => sink.emit(&MountEvent::FaultRaised { axis, word }),
                LatchTransition::Cleared => sink.emit(&MountEvent::FaultCleared { axis }),
            }
        }
        match report.limit {
            Some((axis, word)) => Err(TrackingError::LimitSwitch { axis, word }),
            None => Ok(()),
        }
    }

    // ── Control cycle ─────────────────────────────────────────

    /// Run one tracking cycle toward the target `look_ahead` seconds after
    /// `now` (Unix seconds).  `speed_factor` scales the commanded speed,
    /// above 1 while still syncing onto the target.
    ///
    /// On any error nothing is sent after the status read.
    pub fn run_tracking_step<T: Transport>(
        &mut self,
        link: &mut SitechLink<T>,
        model: &mut (impl EphemerisPort + TrajectoryPort),
        sink: &mut impl EventSink,
        now: f64,
        look_ahead: f64,
        speed_factor: f64,
    ) -> Result<StepReport, TrackingError> {
        // 1. Where are we
        let status = link.get_axis_status(Axis::X).map_err(|e| {
            warn!("status read failed, tracking cycle skipped: {e}");
            TrackingError::Link(e)
        })?;
        let generation = link.generation();
        self.observe_status(&status, &generation, sink)?;
        self.step_from_status(link, model, sink, now, &status, look_ahead, speed_factor)
    }

    /// The rest of a tracking cycle, for a caller that already read and
    /// supervised `status` in this cycle.
    pub fn step_from_status<T: Transport>(
        &mut self,
        link: &mut SitechLink<T>,
        model: &mut (impl EphemerisPort + TrajectoryPort),
        sink: &mut impl EventSink,
        now: f64,
        status: &AxisStatus,
        look_ahead: f64,
        speed_factor: f64,
    ) -> Result<StepReport, TrackingError> {
        let current = Axes::new(status.x_pos, status.y_pos);

        // 2. Where should we be
        let prediction = model.predict(now, current, look_ahead).map_err(|e| {
            error!("ephemeris failed: {e}");
            TrackingError::EphemerisUnavailable
        })?;

        // 3. Feed-forward
        let loop_secs = match self.last_loop {
            Some(t) if now > t => now - t,
            _ => self.config.tracking_interval_secs,
        };
        let feed_forward = match self.previous {
            Some(prev) => Axes::new(
                (f64::from(prediction.target.x) - f64::from(prev.x)) / loop_secs,
                (f64::from(prediction.target.y) - f64::from(prev.y)) / loop_secs,
            ),
            None => prediction.speed,
        };

        // 4-5. Feedback, capped once locked on
        let locked = prediction.target_distance <= self.config.tracking_distance_deg;
        let mut correction = Axes::default();
        for axis in Axis::BOTH {
            let error = *prediction.error.get(axis);
            let mut c = self.axes.get_mut(axis).active_pid().compute(error, loop_secs);
            if locked {
                let cap = (self.config.correction_cap_ratio * feed_forward.get(axis).abs())
                    .max(self.config.correction_cap_min);
                c = c.max(-cap).min(cap);
            }
            *correction.get_mut(axis) = c;
        }

        // 6. Commanded speed and target
        let speed = Axes::new(
            feed_forward.x + correction.x,
            feed_forward.y + correction.y,
        );
        let limits = &self.config.soft_limits;
        let target = Axes::new(
            limits.x.clamp(prediction.target.x),
            limits.y.clamp(prediction.target.y),
        );

        // 7. Trajectory check
        let span = if look_ahead > 0.0 {
            look_ahead
        } else {
            self.config.tracking_interval_secs
        };
        let rates = Axes::new(
            (f64::from(target.x) - f64::from(current.x)).abs() / span / 2.0,
            (f64::from(target.y) - f64::from(current.y)).abs() / span / 2.0,
        );
        let verdict = model.check(
            now,
            current,
            target,
            rates,
            self.config.trajectory_window_secs,
        );
        let truncated = match verdict {
            TrajectoryVerdict::Clear => false,
            TrajectoryVerdict::SoftStop if speed_factor > 1.0 => {
                info!(
                    "trajectory truncated by soft stop, moving {:?} -> {:?}",
                    current, target
                );
                sink.emit(&MountEvent::SoftStopTruncated {
                    from: current,
                    to: target,
                });
                true
            }
            TrajectoryVerdict::SoftStop => {
                warn!("soft stop on tracking trajectory {:?} -> {:?}", current, target);
                return Err(TrackingError::UnsafeTrajectory);
            }
            TrajectoryVerdict::Unsafe => {
                error!("unsafe trajectory {:?} -> {:?}", current, target);
                return Err(TrackingError::UnsafeTrajectory);
            }
        };

        // 8. Controller units
        let request = XAxisRequest {
            x_dest: target.x,
            x_speed: motor_units(link.ticks_per_sec_to_motor_speed(speed.x) * speed_factor),
            y_dest: target.y,
            y_speed: motor_units(link.ticks_per_sec_to_motor_speed(speed.y) * speed_factor),
            x_bits: self.x_bits,
            y_bits: self.y_bits,
        };

        // 9. Send, then bookkeeping
        let reply = link
            .send_axis_request(&MotionRequest::X(request))
            .map_err(|e| {
                warn!("tracking request failed: {e}");
                TrackingError::Link(e)
            })?;
        self.x_bits |= XBIT_TRACKING;

        self.previous = Some(prediction.target);
        self.last_loop = Some(now);
        self.cycles += 1;

        let dps = Axes::new(
            speed.x * 360.0 / f64::from(self.config.ticks_per_circle.x),
            speed.y * 360.0 / f64::from(self.config.ticks_per_circle.y),
        );
        let magnitude = dps.x.hypot(dps.y);
        self.speed_stats.push(magnitude);
        self.speed_angle_stats.push_angle(prediction.speed_angle);
        self.error_angle_stats.push_angle(prediction.error_angle);
        let low_speed = magnitude < self.config.low_speed_dps;
        self.low_speed_cycles = if low_speed {
            self.low_speed_cycles.saturating_add(1)
        } else {
            0
        };

        self.correct_oscillations(prediction.error, speed, sink);
        self.scale_tracking_look(low_speed, sink);

        debug!(
            "track {:?} -> {:?} ff {:.1}/{:.1} corr {:.1}/{:.1} la {:.1}",
            current,
            target,
            feed_forward.x,
            feed_forward.y,
            correction.x,
            correction.y,
            look_ahead
        );
        sink.emit(&MountEvent::Telemetry(TrackingTelemetry {
            position: current,
            target,
            speed,
            error: prediction.error,
            look_ahead,
            target_distance: prediction.target_distance,
        }));

        // A fault raised by the acknowledgement still stops the mount.
        let generation = link.generation();
        self.observe_status(&reply, &generation, sink)?;

        Ok(StepReport {
            status: reply,
            request,
            feed_forward,
            correction,
            speed,
            look_ahead,
            target_distance: prediction.target_distance,
            truncated,
        })
    }

    /// Move straight to `target` at the configured slew speed.  Clears the
    /// tracking bit; the move is checked like any tracking request.
    pub fn send_direct_move<T: Transport>(
        &mut self,
        link: &mut SitechLink<T>,
        model: &mut impl TrajectoryPort,
        sink: &mut impl EventSink,
        now: f64,
        current: Axes<i32>,
        target: Axes<i32>,
    ) -> Result<AxisStatus, TrackingError> {
        let limits = &self.config.soft_limits;
        let target = Axes::new(limits.x.clamp(target.x), limits.y.clamp(target.y));
        let slew = self.config.slew_speed_dps;
        let ticks = self.config.ticks_per_circle;
        let rates = Axes::new(
            slew.x * f64::from(ticks.x).abs() / 360.0,
            slew.y * f64::from(ticks.y).abs() / 360.0,
        );
        match model.check(now, current, target, rates, self.config.trajectory_window_secs) {
            TrajectoryVerdict::Clear => {}
            verdict => {
                error!("direct move {:?} -> {:?} refused: {:?}", current, target, verdict);
                return Err(TrackingError::UnsafeTrajectory);
            }
        }

        self.x_bits &= !XBIT_TRACKING;
        let request = XAxisRequest {
            x_dest: target.x,
            x_speed: motor_units(link.degrees_per_sec_to_motor_speed(slew.x, ticks.x, 360.0)),
            y_dest: target.y,
            y_speed: motor_units(link.degrees_per_sec_to_motor_speed(slew.y, ticks.y, 360.0)),
            x_bits: self.x_bits,
            y_bits: self.y_bits,
        };
        info!("direct move {:?} -> {:?}", current, target);
        let reply = link.send_axis_request(&MotionRequest::X(request))?;
        let generation = link.generation();
        self.observe_status(&reply, &generation, sink)?;
        Ok(reply)
    }

    // ── Oscillation handling ──────────────────────────────────

    /// Push this cycle's errors into the per-axis windows and swap gain
    /// sets where an oscillation starts or has decayed.
    pub fn correct_oscillations(
        &mut self,
        errors: Axes<f64>,
        speeds: Axes<f64>,
        sink: &mut impl EventSink,
    ) -> Axes<Option<OscillationTransition>> {
        let mut out = Axes::new(None, None);
        for axis in Axis::BOTH {
            let error = *errors.get(axis);
            let speed = *speeds.get(axis);
            let lp = self.axes.get_mut(axis);
            lp.errors.push(error);
            let transition = lp.oscillation.update(&lp.errors, error, speed);
            match transition {
                Some(OscillationTransition::Engaged) => {
                    warn!("{axis} axis oscillating, damped gains engaged at {speed:.1}");
                    lp.oscillation_pid.reset();
                    lp.health = AxisHealth::Warning;
                    sink.emit(&MountEvent::OscillationEngaged {
                        axis,
                        speed: speed.abs(),
                    });
                }
                Some(OscillationTransition::Released) => {
                    info!("{axis} axis settled, tracking gains restored");
                    lp.tracking_pid.reset();
                    lp.errors.clear();
                    lp.health = AxisHealth::Good;
                    sink.emit(&MountEvent::OscillationReleased { axis });
                }
                None => {}
            }
            *out.get_mut(axis) = transition;
        }
        out
    }

    // ── Adaptive look-ahead ───────────────────────────────────

    /// Count one cycle toward the next look-ahead evaluation.  Returns the
    /// new look-ahead when it changed.
    pub fn scale_tracking_look(
        &mut self,
        low_speed_now: bool,
        sink: &mut impl EventSink,
    ) -> Option<f64> {
        if self.pinned {
            return None;
        }
        let inputs = LookAheadInputs {
            direction_stdev: self.speed_angle_stats.stdev(),
            low_speed_cycles: self.low_speed_cycles,
            low_speed_now,
        };
        let next = self.scaler.scale(self.look_ahead, inputs)?;
        info!("look-ahead {:.1} s -> {:.1} s", self.look_ahead, next);
        self.look_ahead = next;
        sink.emit(&MountEvent::LookAheadChanged(next));
        Some(next)
    }

    /// Mean commanded speed (deg/s) over the recent window.
    pub fn mean_speed(&self) -> f64 {
        self.speed_stats.mean()
    }

    /// Spread of the error direction (deg) over the recent window.
    pub fn error_angle_spread(&self) -> f64 {
        self.error_angle_stats.stdev()
    }
}

/// Saturating conversion of a signed controller speed to the unsigned
/// request field.
fn motor_units(speed: f64) -> u32 {
    let speed = speed.abs();
    if speed.is_nan() {
        0
    } else if speed >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        speed as u32
    }
}
