//! Port traits: the hexagonal boundary between the mount core and the rest
//! of the observatory.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TrackingEngine / MountService (domain)
//! ```
//!
//! Astrometry (sky ↔ counts, target prediction), trajectory and collision
//! checking, and event delivery live outside this crate.  The domain
//! consumes them through these traits, injected at call sites, so every
//! control path runs against mocks in tests.
//!
//! ## Safety notes
//!
//! - A [`TrajectoryPort`] verdict is authoritative.  The engine never
//!   sends a motion request the checker has not cleared.
//! - [`EphemerisPort`] failures abort the tracking cycle; they are not
//!   retried.

use core::fmt;

use crate::protocol::Axes;

// ───────────────────────────────────────────────────────────────
// Ephemeris port (driven adapter: astrometry → domain)
// ───────────────────────────────────────────────────────────────

/// Where the target will be, as seen by the motor axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Target counts at `utc + look_ahead`.
    pub target: Axes<i32>,
    /// Target speed estimate (counts/s).
    pub speed: Axes<f64>,
    /// Where the mount should be now minus where it is (counts).
    pub error: Axes<f64>,
    /// Direction of the target motion (deg), diagnostic only.
    pub speed_angle: f64,
    /// Direction of the error vector (deg), diagnostic only.
    pub error_angle: f64,
    /// Angular distance between mount and target now (deg).
    pub target_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EphemerisError {
    /// Target is below the configured safety horizon.
    BelowHorizon,
    /// Target cannot be reached by the mount (outside limits, no target set).
    Unreachable,
}

impl fmt::Display for EphemerisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowHorizon => write!(f, "target below horizon"),
            Self::Unreachable => write!(f, "target unreachable"),
        }
    }
}

/// Target prediction.
pub trait EphemerisPort {
    /// Predict the target `look_ahead` seconds after `utc` (Unix seconds),
    /// given the current motor counts.
    fn predict(
        &mut self,
        utc: f64,
        current: Axes<i32>,
        look_ahead: f64,
    ) -> Result<Prediction, EphemerisError>;
}

// ───────────────────────────────────────────────────────────────
// Trajectory port (driven adapter: collision model → domain)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryVerdict {
    /// The whole move is safe.
    Clear,
    /// The move would have to stop short of the target.
    SoftStop,
    /// The move would hit a limit or an obstruction.
    Unsafe,
}

/// Validates a proposed move before it is sent.
pub trait TrajectoryPort {
    /// `rates` are the expected axis speeds (counts/s), `window` the time
    /// span to check (s).
    fn check(
        &mut self,
        utc: f64,
        current: Axes<i32>,
        target: Axes<i32>,
        rates: Axes<f64>,
        window: f64,
    ) -> TrajectoryVerdict;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`MountEvent`](super::events::MountEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::MountEvent);
}

/// Sink that drops everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &super::events::MountEvent) {}
}
