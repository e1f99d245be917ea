//! Mount service: the owning device driver.
//!
//! [`MountService`] owns the mount state machine and the tracking engine.
//! The link, the sky model and the event sink are injected at call sites,
//! so the whole service runs against scripted transports and mock ports.
//!
//! ```text
//!  EphemerisPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                    │      MountService       │
//! TrajectoryPort ──▶ │ state · engine · faults │ ◀─▶ SitechLink
//!                    └────────────────────────┘
//! ```
//!
//! ## States
//!
//! | State    | Per tick                                               |
//! |----------|--------------------------------------------------------|
//! | Idle     | nothing                                                |
//! | Slewing  | direct move when far, speed sync when close, then lock |
//! | Tracking | one tracking cycle                                     |
//! | Parking  | poll until the park position is reached                |
//! | Stopped  | nothing until the errors are reset                     |

use log::{error, info, warn};

use crate::config::MountConfig;
use crate::error::{Error, TrackingError};
use crate::link::{SitechLink, Transport};
use crate::protocol::{Axes, Axis};
use crate::tracking::TrackingEngine;

use super::commands::MountCommand;
use super::events::MountEvent;
use super::ports::{EphemerisPort, EventSink, TrajectoryPort};

/// Consecutive recoverable link failures tolerated before the mount is
/// stopped.
pub const MAX_LINK_FAILURES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Idle,
    Slewing,
    Tracking,
    Parking,
    /// Stopped on a fault; needs a reset or auto-mode command.
    Stopped,
}

// ───────────────────────────────────────────────────────────────
// MountService
// ───────────────────────────────────────────────────────────────

pub struct MountService {
    state: MountState,
    config: MountConfig,
    engine: TrackingEngine,
    /// Start of the running slew or park.
    move_started: Option<f64>,
    link_failures: u32,
    last_error: Option<TrackingError>,
    tick_count: u64,
}

impl MountService {
    /// Construct the service.  Call [`start`](Self::start) next.
    ///
    /// `config` should have passed [`MountConfig::validate`]; an invalid
    /// one is logged and used as is.
    pub fn new(config: MountConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!("starting with an invalid configuration: {e}");
        }
        Self {
            state: MountState::Idle,
            engine: TrackingEngine::new(&config),
            config,
            move_started: None,
            link_failures: 0,
            last_error: None,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&MountEvent::Started(self.state));
        info!("MountService started in {:?}", self.state);
    }

    /// Begin a slew toward the ephemeris target.  Movement starts on the
    /// next [`tick`](Self::tick).  Refused while stopped on a fault.
    pub fn start_slew(&mut self, sink: &mut impl EventSink, now: f64) -> Result<(), Error> {
        if self.state == MountState::Stopped {
            warn!("slew refused: stopped on {:?}", self.last_error);
            return Err(Error::Stopped);
        }
        self.engine.reset();
        self.move_started = Some(now);
        self.last_error = None;
        self.transition(MountState::Slewing, sink);
        Ok(())
    }

    /// Send a direct move to the park position.
    pub fn park<T: Transport>(
        &mut self,
        link: &mut SitechLink<T>,
        model: &mut impl TrajectoryPort,
        sink: &mut impl EventSink,
        now: f64,
    ) -> Result<(), Error> {
        if self.state == MountState::Stopped {
            return Err(Error::Stopped);
        }
        let park = self
            .config
            .park_position
            .ok_or(Error::Config("no park position configured"))?;
        let status = link.get_axis_status(Axis::X)?;
        let generation = link.generation();
        self.engine.observe_status(&status, &generation, sink)?;
        let current = Axes::new(status.x_pos, status.y_pos);

        self.engine
            .send_direct_move(link, model, sink, now, current, park)?;
        self.move_started = Some(now);
        self.transition(MountState::Parking, sink);
        Ok(())
    }

    /// Stop both axes.  Operator stop, so the mount goes back to idle.
    pub fn stop<T: Transport>(
        &mut self,
        link: &mut SitechLink<T>,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        link.stop()?;
        self.move_started = None;
        if self.state != MountState::Stopped {
            self.transition(MountState::Idle, sink);
        }
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cycle of the current state.
    ///
    /// Recoverable link failures are returned to the caller, which retries
    /// after a backoff.  Every other error, and too many link failures in a
    /// row, stops the mount.
    pub fn tick<T: Transport>(
        &mut self,
        link: &mut SitechLink<T>,
        model: &mut (impl EphemerisPort + TrajectoryPort),
        sink: &mut impl EventSink,
        now: f64,
    ) -> Result<(), TrackingError> {
        self.tick_count += 1;

        let result = match self.state {
            MountState::Idle | MountState::Stopped => return Ok(()),
            MountState::Slewing => self.slew_step(link, model, sink, now),
            MountState::Tracking => self.track_step(link, model, sink, now),
            MountState::Parking => self.park_step(link, sink, now),
        };

        match result {
            Ok(()) => {
                self.link_failures = 0;
                Ok(())
            }
            Err(e) if e.is_recoverable() && self.link_failures + 1 < MAX_LINK_FAILURES => {
                self.link_failures += 1;
                warn!(
                    "{e} in {:?} ({}/{MAX_LINK_FAILURES})",
                    self.state, self.link_failures
                );
                Err(e)
            }
            Err(e) => Err(self.abort(e, link, sink)),
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an operator command.
    pub fn handle_command<T: Transport>(
        &mut self,
        cmd: MountCommand,
        link: &mut SitechLink<T>,
        model: &mut (impl EphemerisPort + TrajectoryPort),
        sink: &mut impl EventSink,
        now: f64,
    ) -> Result<(), Error> {
        match cmd {
            MountCommand::StartSlew => self.start_slew(sink, now),
            MountCommand::Park => self.park(link, model, sink, now),
            MountCommand::Stop => self.stop(link, sink),
            MountCommand::ResetErrors => {
                link.reset_errors()?;
                self.engine.clear_faults();
                self.recover(sink);
                Ok(())
            }
            MountCommand::GoAuto => {
                link.set_auto_mode(Axis::X, true)?;
                link.set_auto_mode(Axis::Y, true)?;
                self.recover(sink);
                Ok(())
            }
            MountCommand::ResetController => {
                link.reset_controller()?;
                self.move_started = None;
                self.engine.clear_faults();
                self.last_error = None;
                self.transition(MountState::Idle, sink);
                Ok(())
            }
            MountCommand::ZeroMotor => {
                if self.is_moving() {
                    warn!("zero motor ignored while {:?}", self.state);
                    return Ok(());
                }
                link.zero_motor()?;
                Ok(())
            }
            MountCommand::PinLookAhead(value) => {
                self.engine.pin_look_ahead(value);
                Ok(())
            }
            MountCommand::UpdateConfig(config) => {
                if self.is_moving() {
                    return Err(Error::Config("configuration cannot change while moving"));
                }
                config.validate()?;
                self.engine = TrackingEngine::new(&config);
                self.config = *config;
                info!("Configuration updated at runtime");
                Ok(())
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn is_moving(&self) -> bool {
        matches!(
            self.state,
            MountState::Slewing | MountState::Tracking | MountState::Parking
        )
    }

    pub fn engine(&self) -> &TrackingEngine {
        &self.engine
    }

    /// Error that stopped the mount, until the next reset.
    pub fn last_error(&self) -> Option<TrackingError> {
        self.last_error
    }

    pub fn hardware_error(&self) -> bool {
        self.engine.hardware_error()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    // ── State bodies ──────────────────────────────────────────

    fn slew_step<T: Transport>(
        &mut self,
        link: &mut SitechLink<T>,
        model: &mut (impl EphemerisPort + TrajectoryPort),
        sink: &mut impl EventSink,
        now: f64,
    ) -> Result<(), TrackingError> {
        if self.timed_out(now) {
            self.time_out(link, sink);
            return Ok(());
        }

        let status = link.get_axis_status(Axis::X)?;
        let generation = link.generation();
        self.engine.observe_status(&status, &generation, sink)?;
        let current = Axes::new(status.x_pos, status.y_pos);
        let prediction = model.predict(now, current, 0.0).map_err(|e| {
            error!("ephemeris failed: {e}");
            TrackingError::EphemerisUnavailable
        })?;

        let distance = prediction.target_distance;
        if distance <= self.config.tracking_distance_deg {
            info!("target reached, tracking");
            self.move_started = None;
            self.transition(MountState::Tracking, sink);
        } else if distance < self.config.close_approach_deg {
            let (look_ahead, speed_factor) = if distance < self.config.slow_sync_distance_deg {
                (self.engine.look_ahead(), self.config.tracking_factor)
            } else {
                (
                    self.config.fast_sync_look_ahead_secs,
                    self.config.fast_sync_speed,
                )
            };
            // Status was read above; one round trip per cycle on the line.
            self.engine.step_from_status(
                link,
                model,
                sink,
                now,
                &status,
                look_ahead,
                speed_factor,
            )?;
        } else {
            self.engine
                .send_direct_move(link, model, sink, now, current, prediction.target)?;
        }
        Ok(())
    }

    fn track_step<T: Transport>(
        &mut self,
        link: &mut SitechLink<T>,
        model: &mut (impl EphemerisPort + TrajectoryPort),
        sink: &mut impl EventSink,
        now: f64,
    ) -> Result<(), TrackingError> {
        let look_ahead = self.engine.look_ahead();
        let report = self.engine.run_tracking_step(
            link,
            model,
            sink,
            now,
            look_ahead,
            self.config.tracking_factor,
        )?;
        if report.target_distance >= self.config.close_approach_deg {
            warn!(
                "target lost at {:.3} deg, resyncing",
                report.target_distance
            );
            self.move_started = Some(now);
            self.transition(MountState::Slewing, sink);
        }
        Ok(())
    }

    fn park_step<T: Transport>(
        &mut self,
        link: &mut SitechLink<T>,
        sink: &mut impl EventSink,
        now: f64,
    ) -> Result<(), TrackingError> {
        let Some(park) = self.config.park_position else {
            self.transition(MountState::Idle, sink);
            return Ok(());
        };
        if self.timed_out(now) {
            self.time_out(link, sink);
            return Ok(());
        }

        let status = link.get_axis_status(Axis::X)?;
        let generation = link.generation();
        self.engine.observe_status(&status, &generation, sink)?;

        let ticks = self.config.ticks_per_circle;
        let distance = |pos: i32, goal: i32, ticks: i32| {
            (f64::from(goal) - f64::from(pos)).abs() * 360.0 / f64::from(ticks).abs()
        };
        let off = distance(status.x_pos, park.x, ticks.x).max(distance(status.y_pos, park.y, ticks.y));
        if off <= self.config.tracking_distance_deg {
            info!("parked at {:?}", park);
            self.move_started = None;
            self.transition(MountState::Idle, sink);
        }
        Ok(())
    }

    // ── Internal ──────────────────────────────────────────────

    fn timed_out(&self, now: f64) -> bool {
        self.move_started
            .is_some_and(|t| now - t > self.config.slew_timeout_secs)
    }

    fn time_out<T: Transport>(&mut self, link: &mut SitechLink<T>, sink: &mut impl EventSink) {
        error!(
            "{:?} did not finish within {:.0} s",
            self.state, self.config.slew_timeout_secs
        );
        sink.emit(&MountEvent::SlewTimedOut);
        if let Err(e) = link.stop() {
            error!("stop failed: {e}");
        }
        self.move_started = None;
        self.transition(MountState::Stopped, sink);
    }

    /// Stop the mount on a fatal error.  Returns the error for the caller.
    fn abort<T: Transport>(
        &mut self,
        err: TrackingError,
        link: &mut SitechLink<T>,
        sink: &mut impl EventSink,
    ) -> TrackingError {
        error!("{:?} aborted: {err}", self.state);
        if let Err(e) = link.stop() {
            error!("stop failed: {e}");
        }
        self.move_started = None;
        self.link_failures = 0;
        self.last_error = Some(err);
        sink.emit(&MountEvent::TrackingAborted(err));
        self.transition(MountState::Stopped, sink);
        err
    }

    /// Leave the stopped state after an operator reset.
    fn recover(&mut self, sink: &mut impl EventSink) {
        self.last_error = None;
        if self.state == MountState::Stopped {
            self.transition(MountState::Idle, sink);
        }
    }

    fn transition(&mut self, to: MountState, sink: &mut impl EventSink) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        info!("{:?} -> {:?}", from, to);
        sink.emit(&MountEvent::StateChanged { from, to });
    }
}
