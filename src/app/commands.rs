//! Inbound commands to the mount service.
//!
//! These represent operator actions (CLI, remote control, scheduler) that
//! the [`MountService`](super::service::MountService) interprets and acts
//! upon.

use crate::config::MountConfig;

/// Commands that external adapters can send into the mount core.
#[derive(Debug, Clone, PartialEq)]
pub enum MountCommand {
    /// Slew to the target served by the ephemeris and start tracking it.
    StartSlew,

    /// Move to the configured park position.
    Park,

    /// Stop both axes immediately.
    Stop,

    /// Clear the controller error state.
    ResetErrors,

    /// Put both axes back into auto (servo) mode.
    GoAuto,

    /// Reset the controller.
    ResetController,

    /// Set both motor positions to zero.  Ignored while moving.
    ZeroMotor,

    /// Pin the tracking look-ahead (s), or release it with `None`.
    PinLookAhead(Option<f64>),

    /// Replace the configuration.  Refused while moving.
    UpdateConfig(Box<MountConfig>),
}
