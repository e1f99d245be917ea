//! Outbound application events.
//!
//! The [`MountService`](super::service::MountService) and the tracking
//! engine emit these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them.

use crate::error::TrackingError;
use crate::protocol::{Axes, Axis};

use super::service::MountState;

/// Structured events emitted by the mount core.
#[derive(Debug, Clone, PartialEq)]
pub enum MountEvent {
    /// The service was started (carries the initial state).
    Started(MountState),

    /// The service moved between states.
    StateChanged { from: MountState, to: MountState },

    /// A new fault word was reported on an axis.
    FaultRaised { axis: Axis, word: u16 },

    /// The fault word of an axis went back to zero.
    FaultCleared { axis: Axis },

    /// Damped gains engaged on an axis.
    OscillationEngaged { axis: Axis, speed: f64 },

    /// Tracking gains restored on an axis.
    OscillationReleased { axis: Axis },

    /// Adaptive look-ahead changed (s).
    LookAheadChanged(f64),

    /// A fast-sync move was accepted although it stops short.
    SoftStopTruncated { from: Axes<i32>, to: Axes<i32> },

    /// Tracking stopped on a fatal error.
    TrackingAborted(TrackingError),

    /// A slew did not reach its target in time.
    SlewTimedOut,

    /// Per-cycle tracking numbers.
    Telemetry(TrackingTelemetry),
}

/// One tracking cycle, suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingTelemetry {
    pub position: Axes<i32>,
    pub target: Axes<i32>,
    /// Commanded speed (counts/s).
    pub speed: Axes<f64>,
    /// Positional error (counts).
    pub error: Axes<f64>,
    pub look_ahead: f64,
    pub target_distance: f64,
}
