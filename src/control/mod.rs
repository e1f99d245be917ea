//! Control primitives used by the tracking loop.

pub mod look_ahead;
pub mod oscillation;
pub mod pid;
pub mod stats;

pub use look_ahead::{LookAheadInputs, LookAheadParams, LookAheadScaler};
pub use oscillation::{OscillationState, OscillationTransition};
pub use pid::{PidController, PidGains};
pub use stats::Statistics;
